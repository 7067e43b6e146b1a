//! The signed-request client capability and the native transport seam.
//!
//! Application code is typed against [`SignedClient`]. Native transports
//! implement it directly; [`crate::proxy::ProxyClient`] implements it on top
//! of a native transport so that calls can be intercepted.

use crate::errors::VcrError;
use crate::interaction::{HeaderMap, InfoMap, Payload, HTTP_CODE_INFO_KEY};
use crate::runtime::lock;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};

pub trait SignedClient: Send {
    /// Performs a signed fetch. `Ok(false)` is a completed call the transport
    /// reports as unsuccessful.
    fn fetch(
        &mut self,
        url: &str,
        extra_parameters: &Payload,
        method: &str,
        headers: &HeaderMap,
    ) -> Result<bool, VcrError>;

    fn last_response_info(&self) -> Option<InfoMap>;
    /// Raw CR/LF header block of the last response.
    fn last_response_headers(&self) -> Option<String>;
    /// Raw body of the last response.
    fn last_response(&self) -> Option<String>;
}

pub trait NativeCapability: Send + Sync {
    fn signed_requests_available(&self) -> bool;
}

/// Produces native signed clients for a set of credentials.
pub trait TransportFactory: NativeCapability {
    fn connect(&self, credentials: &Credentials) -> Result<Box<dyn SignedClient>, VcrError>;
}

pub(crate) fn ensure_native_capability<C>(capability: &C) -> Result<(), VcrError>
where
    C: NativeCapability + ?Sized,
{
    if capability.signed_requests_available() {
        Ok(())
    } else {
        Err(VcrError::MissingNativeCapability(
            "signed OAuth requests are not supported by this runtime".to_string(),
        ))
    }
}

// ── Credentials ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureMethod {
    #[default]
    HmacSha1,
    HmacSha256,
    RsaSha1,
    Plaintext,
}

/// Where the OAuth parameters travel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    #[default]
    Authorization,
    Uri,
    Form,
    None,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    #[serde(default)]
    pub signature_method: SignatureMethod,
    #[serde(default)]
    pub auth_type: AuthType,
}

impl Credentials {
    pub fn new(consumer_key: impl Into<String>, consumer_secret: impl Into<String>) -> Self {
        Self {
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
            signature_method: SignatureMethod::default(),
            auth_type: AuthType::default(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"[REDACTED]")
            .field("signature_method", &self.signature_method)
            .field("auth_type", &self.auth_type)
            .finish()
    }
}

// ── Fakes ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeCall {
    pub url: String,
    pub extra_parameters: Payload,
    pub method: String,
    pub headers: HeaderMap,
}

#[derive(Debug, Clone)]
struct FakeExchange {
    outcome: Result<bool, VcrError>,
    info: InfoMap,
    raw_headers: String,
    body: String,
}

#[derive(Default)]
struct FakeTransportState {
    queued: VecDeque<FakeExchange>,
    calls: Vec<FakeCall>,
    last: Option<FakeExchange>,
}

/// Scripted native transport. Clones share state, so a test can keep one
/// handle for assertions while the client under test owns another.
#[derive(Default, Clone)]
pub struct FakeSignedTransport {
    state: Arc<Mutex<FakeTransportState>>,
}

impl FakeSignedTransport {
    /// Queues a successful exchange reporting `status` as its `http_code`.
    pub fn push_success(&self, status: u16, raw_headers: &str, body: &str) {
        self.push_exchange(Ok(true), status, raw_headers, body);
    }

    /// Queues a completed exchange the transport reports as unsuccessful.
    pub fn push_failure(&self, status: u16, raw_headers: &str, body: &str) {
        self.push_exchange(Ok(false), status, raw_headers, body);
    }

    pub fn push_error(&self, error: VcrError) {
        self.push_exchange(Err(error), 0, "", "");
    }

    pub fn calls(&self) -> Vec<FakeCall> {
        lock(&self.state).calls.clone()
    }

    fn push_exchange(&self, outcome: Result<bool, VcrError>, status: u16, raw: &str, body: &str) {
        let mut info = InfoMap::new();
        info.insert(HTTP_CODE_INFO_KEY.to_string(), json!(status));
        lock(&self.state).queued.push_back(FakeExchange {
            outcome,
            info,
            raw_headers: raw.to_string(),
            body: body.to_string(),
        });
    }
}

impl SignedClient for FakeSignedTransport {
    fn fetch(
        &mut self,
        url: &str,
        extra_parameters: &Payload,
        method: &str,
        headers: &HeaderMap,
    ) -> Result<bool, VcrError> {
        let mut state = lock(&self.state);
        state.calls.push(FakeCall {
            url: url.to_string(),
            extra_parameters: extra_parameters.clone(),
            method: method.to_string(),
            headers: headers.clone(),
        });
        let exchange = state
            .queued
            .pop_front()
            .ok_or_else(|| VcrError::Transport("no fake response queued".to_string()))?;
        let outcome = exchange.outcome.clone();
        if outcome.is_ok() {
            state.last = Some(exchange);
        }
        outcome
    }

    fn last_response_info(&self) -> Option<InfoMap> {
        lock(&self.state).last.as_ref().map(|e| e.info.clone())
    }

    fn last_response_headers(&self) -> Option<String> {
        lock(&self.state).last.as_ref().map(|e| e.raw_headers.clone())
    }

    fn last_response(&self) -> Option<String> {
        lock(&self.state).last.as_ref().map(|e| e.body.clone())
    }
}

/// Hands out clones of one [`FakeSignedTransport`] and remembers the
/// credentials it was asked to connect with.
#[derive(Clone)]
pub struct FakeTransportFactory {
    pub transport: FakeSignedTransport,
    available: bool,
    connected: Arc<Mutex<Vec<Credentials>>>,
}

impl FakeTransportFactory {
    pub fn new(transport: FakeSignedTransport) -> Self {
        Self {
            transport,
            available: true,
            connected: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new(FakeSignedTransport::default())
        }
    }

    pub fn connected(&self) -> Vec<Credentials> {
        lock(&self.connected).clone()
    }
}

impl NativeCapability for FakeTransportFactory {
    fn signed_requests_available(&self) -> bool {
        self.available
    }
}

impl TransportFactory for FakeTransportFactory {
    fn connect(&self, credentials: &Credentials) -> Result<Box<dyn SignedClient>, VcrError> {
        ensure_native_capability(self)?;
        lock(&self.connected).push(credentials.clone());
        Ok(Box::new(self.transport.clone()))
    }
}
