//! In-memory cassette: the lookup and record collaborator tests hand to a
//! [`crate::hook::FetchHook`]. Interactions live only as long as the cassette.

use crate::hook::{LookupCallback, RecordCallback};
use crate::interaction::{Request, Response};
use crate::runtime::lock;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct CassetteState {
    interactions: Vec<(Request, Response)>,
    // fingerprint -> index of the latest matching interaction
    index: HashMap<String, usize>,
    lookups: usize,
}

#[derive(Default, Clone)]
pub struct MemoryCassette {
    state: Arc<Mutex<CassetteState>>,
}

impl MemoryCassette {
    pub fn with_interactions(interactions: impl IntoIterator<Item = (Request, Response)>) -> Self {
        let cassette = Self::default();
        for (request, response) in interactions {
            cassette.record(&request, &response);
        }
        cassette
    }

    /// Stores a pair. A later recording of the same request shadows earlier
    /// ones for playback.
    pub fn record(&self, request: &Request, response: &Response) {
        let mut state = lock(&self.state);
        let position = state.interactions.len();
        state.interactions.push((request.clone(), response.clone()));
        state.index.insert(request.fingerprint(), position);
    }

    pub fn playback(&self, request: &Request) -> Option<Response> {
        let mut state = lock(&self.state);
        state.lookups += 1;
        let position = *state.index.get(&request.fingerprint())?;
        state.interactions.get(position).map(|(_, response)| response.clone())
    }

    pub fn lookup_callback(&self) -> LookupCallback {
        let cassette = self.clone();
        Arc::new(move |request: &Request| cassette.playback(request))
    }

    pub fn record_callback(&self) -> RecordCallback {
        let cassette = self.clone();
        Arc::new(move |request: &Request, response: &Response| cassette.record(request, response))
    }

    pub fn interactions(&self) -> Vec<(Request, Response)> {
        lock(&self.state).interactions.clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.state).interactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of playback lookups served or missed so far.
    pub fn lookups(&self) -> usize {
        lock(&self.state).lookups
    }
}
