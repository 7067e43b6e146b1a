//! The interception hook: decides, per signed fetch, whether to play back a
//! recorded response or to perform the real call and record it.
//!
//! A hook starts out [`HookState::Disabled`]. Enabling it installs a lookup
//! callback and, on the first transition only, registers the source rewriter
//! with the loader so construction sites produce proxy clients. While enabled,
//! [`FetchHook::fetch`] asks the lookup callback for a response; on a miss the
//! client performs the real fetch and the result goes to the record callback.
//!
//! One hook serves one recording/playback session at a time: a second
//! `enable` replaces the active lookup callback rather than nesting.

use crate::config::VcrConfig;
use crate::errors::VcrError;
use crate::interaction::{HeaderMap, Payload, Request, Response};
use crate::loader::SourceLoader;
use crate::logging::append_run_log;
use crate::rewriter::PatternRewriter;
use crate::runtime::lock;
use crate::transport::{ensure_native_capability, NativeCapability};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::{Arc, Mutex};

/// Playback lookup: the recorded response for a request, if any.
pub type LookupCallback = Arc<dyn Fn(&Request) -> Option<Response> + Send + Sync>;
/// Capture of a real request/response pair.
pub type RecordCallback = Arc<dyn Fn(&Request, &Response) + Send + Sync>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookState {
    #[default]
    Disabled,
    Enabled,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HookOptions {
    /// Fold a fetch's extra parameters into the request used for lookup and
    /// recording. Off by default: requests are keyed on method, url and
    /// headers only.
    pub match_extra_parameters: bool,
}

/// What the hook needs from the client whose fetch it intercepts.
pub trait Interceptable {
    /// Performs the fetch on the native transport and stores the parsed
    /// response as the client's last response.
    fn do_real_fetch(
        &mut self,
        url: &str,
        extra_parameters: &Payload,
        method: &str,
        headers: &HeaderMap,
    ) -> Result<bool, VcrError>;

    fn last_response_object(&self) -> Option<&Response>;

    /// Replaces the last response wholesale, bypassing transport parsing.
    fn set_last_response_object(&mut self, response: Response);

    /// Forgets the last response after a fetch that produced none.
    fn clear_last_response_object(&mut self);
}

#[derive(Default)]
struct HookSlots {
    state: HookState,
    lookup: Option<LookupCallback>,
    record: Option<RecordCallback>,
}

pub struct FetchHook {
    rewriter: Arc<PatternRewriter>,
    loader: Arc<dyn SourceLoader>,
    options: HookOptions,
    slots: Mutex<HookSlots>,
}

impl FetchHook {
    pub fn new(
        rewriter: Arc<PatternRewriter>,
        loader: Arc<dyn SourceLoader>,
        capability: &dyn NativeCapability,
    ) -> Result<Self, VcrError> {
        ensure_native_capability(capability)?;
        Ok(Self {
            rewriter,
            loader,
            options: HookOptions::default(),
            slots: Mutex::new(HookSlots::default()),
        })
    }

    /// Hook built from loaded configuration: its rewriter comes from
    /// `[rewriter]` and its options from `[hook]`.
    pub fn from_config(
        cfg: &VcrConfig,
        loader: Arc<dyn SourceLoader>,
        capability: &dyn NativeCapability,
    ) -> Result<Self, VcrError> {
        let rewriter = Arc::new(cfg.build_rewriter()?);
        Ok(Self::new(rewriter, loader, capability)?.with_options(cfg.hook_options()))
    }

    pub fn with_options(mut self, options: HookOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> HookOptions {
        self.options
    }

    /// Installs `lookup` as the active lookup callback. Registration with the
    /// source loader happens only when the hook was disabled.
    pub fn enable(&self, lookup: Option<LookupCallback>) -> Result<(), VcrError> {
        let lookup = lookup.ok_or_else(|| {
            VcrError::InvalidCallback("no valid callback for handling requests defined".to_string())
        })?;
        let previous = {
            let mut slots = lock(&self.slots);
            slots.lookup = Some(lookup);
            std::mem::replace(&mut slots.state, HookState::Enabled)
        };
        if previous == HookState::Enabled {
            return Ok(());
        }

        // Loader calls happen unlocked; the loader may query the hook.
        self.rewriter.register(self.loader.as_ref());
        self.loader.intercept();
        append_run_log(
            "info",
            "hook.enabled",
            json!({ "transformers": self.loader.transformer_names() }),
        );
        Ok(())
    }

    /// Installs the record callback. Independent of the hook state.
    pub fn set_record_callback(&self, record: Option<RecordCallback>) -> Result<(), VcrError> {
        let record = record.ok_or_else(|| {
            VcrError::InvalidCallback("no valid callback for recording responses defined".to_string())
        })?;
        lock(&self.slots).record = Some(record);
        Ok(())
    }

    /// Clears the lookup callback and disables the hook. The record callback
    /// survives.
    pub fn disable(&self) {
        let mut slots = lock(&self.slots);
        if slots.state == HookState::Disabled {
            return;
        }
        slots.lookup = None;
        slots.state = HookState::Disabled;
        append_run_log("info", "hook.disabled", json!({}));
    }

    pub fn is_enabled(&self) -> bool {
        self.state() == HookState::Enabled
    }

    pub fn state(&self) -> HookState {
        lock(&self.slots).state
    }

    pub fn has_lookup_callback(&self) -> bool {
        lock(&self.slots).lookup.is_some()
    }

    pub fn has_record_callback(&self) -> bool {
        lock(&self.slots).record.is_some()
    }

    /// Intercepts one signed fetch made through `client`.
    ///
    /// Fails with [`VcrError::HookDisabled`] before touching the network when
    /// the hook is disabled, leaving `client` without a last response. Errors from the real fetch are returned as-is and
    /// nothing is recorded for them.
    pub fn fetch(
        &self,
        client: &mut dyn Interceptable,
        url: &str,
        extra_parameters: &Payload,
        method: &str,
        headers: &HeaderMap,
    ) -> Result<bool, VcrError> {
        // Callbacks run without the lock held so they may call back into the hook.
        let (lookup, record) = {
            let slots = lock(&self.slots);
            if slots.state == HookState::Disabled {
                append_run_log(
                    "warn",
                    "hook.fetch.refused",
                    json!({ "method": method, "url": url }),
                );
                drop(slots);
                client.clear_last_response_object();
                return Err(VcrError::HookDisabled);
            }
            (slots.lookup.clone(), slots.record.clone())
        };

        let request = self.build_request(url, extra_parameters, method, headers);

        if let Some(response) = lookup.and_then(|lookup| lookup(&request)) {
            append_run_log(
                "info",
                "hook.playback.hit",
                json!({
                    "method": request.method,
                    "url": request.url,
                    "status_code": response.status_code
                }),
            );
            client.set_last_response_object(response);
            return Ok(true);
        }

        append_run_log(
            "info",
            "hook.playback.miss",
            json!({ "method": request.method, "url": request.url }),
        );
        let fetched = client
            .do_real_fetch(url, extra_parameters, method, headers)
            .inspect_err(|error| {
                append_run_log(
                    "warn",
                    "hook.real_fetch.failed",
                    json!({ "url": url, "error": error.to_string() }),
                );
            })?;
        if !fetched {
            append_run_log(
                "warn",
                "hook.real_fetch.failed",
                json!({ "url": url, "error": "transport reported failure" }),
            );
            return Ok(false);
        }

        match (record, client.last_response_object()) {
            (Some(record), Some(response)) => {
                record(&request, response);
                append_run_log(
                    "info",
                    "hook.record.stored",
                    json!({
                        "method": request.method,
                        "url": request.url,
                        "status_code": response.status_code
                    }),
                );
            }
            (None, _) => {
                append_run_log(
                    "warn",
                    "hook.record.skipped",
                    json!({ "url": request.url, "reason": "no record callback" }),
                );
            }
            (Some(_), None) => {
                append_run_log(
                    "warn",
                    "hook.record.skipped",
                    json!({ "url": request.url, "reason": "client kept no response" }),
                );
            }
        }
        Ok(true)
    }

    fn build_request(
        &self,
        url: &str,
        extra_parameters: &Payload,
        method: &str,
        headers: &HeaderMap,
    ) -> Request {
        let request = Request::new(method, url, headers.clone());
        if self.options.match_extra_parameters {
            request.with_payload(extra_parameters.clone())
        } else {
            request
        }
    }
}
