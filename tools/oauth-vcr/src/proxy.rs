//! Drop-in replacement for the native signed client whose fetches can be
//! intercepted by a [`FetchHook`].

use crate::errors::VcrError;
use crate::hook::{FetchHook, Interceptable};
use crate::interaction::{HeaderMap, InfoMap, Payload, Response};
use crate::logging::append_run_log;
use crate::registry::registered_hook;
use crate::transport::SignedClient;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// What a proxy client does when its hook is disabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisabledPolicy {
    /// Perform the real fetch without recording it.
    #[default]
    PassThrough,
    /// Fail with [`VcrError::HookDisabled`], like the hook itself does.
    Refuse,
}

pub struct ProxyClient {
    native: Box<dyn SignedClient>,
    hook: Option<Arc<FetchHook>>,
    disabled_policy: DisabledPolicy,
    last_response: Option<Response>,
}

impl ProxyClient {
    /// Wraps `native`. Without an injected hook the client resolves one from
    /// the composition-root registry on its first fetch.
    pub fn new(native: Box<dyn SignedClient>) -> Self {
        Self {
            native,
            hook: None,
            disabled_policy: DisabledPolicy::default(),
            last_response: None,
        }
    }

    pub fn with_hook(mut self, hook: Arc<FetchHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn with_disabled_policy(mut self, policy: DisabledPolicy) -> Self {
        self.disabled_policy = policy;
        self
    }

    pub fn set_hook(&mut self, hook: Arc<FetchHook>) {
        self.hook = Some(hook);
    }

    pub fn disabled_policy(&self) -> DisabledPolicy {
        self.disabled_policy
    }

    fn route_fetch(
        &mut self,
        url: &str,
        extra_parameters: &Payload,
        method: &str,
        headers: &HeaderMap,
    ) -> Result<bool, VcrError> {
        let hook = self.resolve_hook()?;
        if hook.is_enabled() {
            return hook.fetch(self, url, extra_parameters, method, headers);
        }
        match self.disabled_policy {
            DisabledPolicy::Refuse => Err(VcrError::HookDisabled),
            DisabledPolicy::PassThrough => {
                append_run_log(
                    "debug",
                    "proxy.fetch.passthrough",
                    json!({ "method": method, "url": url }),
                );
                self.do_real_fetch(url, extra_parameters, method, headers)
            }
        }
    }

    fn resolve_hook(&mut self) -> Result<Arc<FetchHook>, VcrError> {
        if let Some(hook) = &self.hook {
            return Ok(Arc::clone(hook));
        }
        let hook = registered_hook().ok_or(VcrError::NoHookRegistered)?;
        self.hook = Some(Arc::clone(&hook));
        Ok(hook)
    }
}

impl SignedClient for ProxyClient {
    fn fetch(
        &mut self,
        url: &str,
        extra_parameters: &Payload,
        method: &str,
        headers: &HeaderMap,
    ) -> Result<bool, VcrError> {
        let result = self.route_fetch(url, extra_parameters, method, headers);
        if result.is_err() {
            self.clear_last_response_object();
        }
        result
    }

    fn last_response_info(&self) -> Option<InfoMap> {
        self.last_response.as_ref().map(|r| r.info.clone())
    }

    fn last_response_headers(&self) -> Option<String> {
        self.last_response.as_ref().map(Response::raw_headers)
    }

    fn last_response(&self) -> Option<String> {
        self.last_response.as_ref().map(|r| r.body.clone())
    }
}

impl Interceptable for ProxyClient {
    fn do_real_fetch(
        &mut self,
        url: &str,
        extra_parameters: &Payload,
        method: &str,
        headers: &HeaderMap,
    ) -> Result<bool, VcrError> {
        let result = self.native.fetch(url, extra_parameters, method, headers);
        self.last_response = match result {
            Ok(_) => Some(Response::from_transport(
                self.native.last_response_info().unwrap_or_default(),
                &self.native.last_response_headers().unwrap_or_default(),
                self.native.last_response().unwrap_or_default(),
            )),
            Err(_) => None,
        };
        result
    }

    fn last_response_object(&self) -> Option<&Response> {
        self.last_response.as_ref()
    }

    fn set_last_response_object(&mut self, response: Response) {
        self.last_response = Some(response);
    }

    fn clear_last_response_object(&mut self) {
        self.last_response = None;
    }
}
