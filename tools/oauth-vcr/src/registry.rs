//! Composition root: the process-wide hook slot proxy clients fall back to,
//! and [`ClientFactory`], which hands out proxy clients with the hook
//! injected.
//!
//! Follows the `OnceLock<Mutex<Option<…>>>` slot pattern from `logging.rs`.
//! Library code never reads the slot except through [`ProxyClient`]'s
//! fallback; everything else receives the hook explicitly.

use crate::config::VcrConfig;
use crate::errors::VcrError;
use crate::hook::FetchHook;
use crate::proxy::{DisabledPolicy, ProxyClient};
use crate::runtime::lock;
use crate::transport::{ensure_native_capability, Credentials, TransportFactory};
use std::sync::{Arc, Mutex, OnceLock};

static HOOK_SLOT: OnceLock<Mutex<Option<Arc<FetchHook>>>> = OnceLock::new();

fn hook_slot() -> &'static Mutex<Option<Arc<FetchHook>>> {
    HOOK_SLOT.get_or_init(|| Mutex::new(None))
}

/// Installs `hook` as the fallback for proxy clients created without one.
/// Returns the previously installed hook.
pub fn install_hook(hook: Arc<FetchHook>) -> Option<Arc<FetchHook>> {
    lock(hook_slot()).replace(hook)
}

pub fn registered_hook() -> Option<Arc<FetchHook>> {
    lock(hook_slot()).clone()
}

pub fn clear_hook() -> Option<Arc<FetchHook>> {
    lock(hook_slot()).take()
}

pub struct ClientFactory {
    hook: Arc<FetchHook>,
    transports: Arc<dyn TransportFactory>,
    disabled_policy: DisabledPolicy,
}

impl ClientFactory {
    pub fn new(hook: Arc<FetchHook>, transports: Arc<dyn TransportFactory>) -> Self {
        Self {
            hook,
            transports,
            disabled_policy: DisabledPolicy::default(),
        }
    }

    /// Factory whose clients follow `[hook] disabled_policy`.
    pub fn from_config(
        hook: Arc<FetchHook>,
        transports: Arc<dyn TransportFactory>,
        cfg: &VcrConfig,
    ) -> Self {
        Self::new(hook, transports).with_disabled_policy(cfg.hook.disabled_policy)
    }

    pub fn with_disabled_policy(mut self, policy: DisabledPolicy) -> Self {
        self.disabled_policy = policy;
        self
    }

    pub fn hook(&self) -> &Arc<FetchHook> {
        &self.hook
    }

    /// Connects a native client for `credentials` and wraps it in a proxy
    /// client bound to this factory's hook.
    pub fn create(&self, credentials: &Credentials) -> Result<ProxyClient, VcrError> {
        ensure_native_capability(self.transports.as_ref())?;
        let native = self.transports.connect(credentials)?;
        Ok(ProxyClient::new(native)
            .with_hook(Arc::clone(&self.hook))
            .with_disabled_policy(self.disabled_policy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::{HeaderMap, Payload, Request, Response};
    use crate::loader::TransformingLoader;
    use crate::rewriter::PatternRewriter;
    use crate::runtime::FakeFileSystem;
    use crate::transport::{FakeSignedTransport, FakeTransportFactory, SignedClient};

    fn hook(transports: &FakeTransportFactory) -> Arc<FetchHook> {
        let loader = Arc::new(TransformingLoader::new(Arc::new(FakeFileSystem::default())));
        let rewriter = Arc::new(PatternRewriter::oauth().expect("rewriter"));
        Arc::new(FetchHook::new(rewriter, loader, transports).expect("hook"))
    }

    #[test]
    fn factory_injects_hook_and_policy() {
        let transports = FakeTransportFactory::new(FakeSignedTransport::default());
        let hook = hook(&transports);
        let factory = ClientFactory::new(Arc::clone(&hook), Arc::new(transports.clone()))
            .with_disabled_policy(DisabledPolicy::Refuse);

        let mut client = factory
            .create(&Credentials::new("key", "secret"))
            .expect("client");
        assert_eq!(client.disabled_policy(), DisabledPolicy::Refuse);
        assert_eq!(transports.connected().len(), 1);
        assert_eq!(
            client.fetch("https://a", &Payload::Empty, "GET", &HeaderMap::new()),
            Err(VcrError::HookDisabled)
        );

        hook.enable(Some(Arc::new(|_: &Request| {
            Some(Response::new(200, HeaderMap::new(), "cached"))
        })))
        .expect("enable");
        assert_eq!(
            client.fetch("https://a", &Payload::Empty, "GET", &HeaderMap::new()),
            Ok(true)
        );
        assert_eq!(client.last_response().as_deref(), Some("cached"));
    }

    #[test]
    fn factory_fails_without_native_capability() {
        let available = FakeTransportFactory::new(FakeSignedTransport::default());
        let factory = ClientFactory::new(hook(&available), Arc::new(FakeTransportFactory::unavailable()));
        assert!(matches!(
            factory.create(&Credentials::new("key", "secret")),
            Err(VcrError::MissingNativeCapability(_))
        ));
    }

    // The only test in the crate touching the process-wide slot.
    #[test]
    fn proxy_client_falls_back_to_registered_hook_once() {
        let transports = FakeTransportFactory::new(FakeSignedTransport::default());
        transports.transport.push_success(200, "", "live");
        let mut client = crate::proxy::ProxyClient::new(Box::new(transports.transport.clone()));

        clear_hook();
        assert_eq!(
            client.fetch("https://a", &Payload::Empty, "GET", &HeaderMap::new()),
            Err(VcrError::NoHookRegistered)
        );

        let first = hook(&transports);
        assert!(install_hook(Arc::clone(&first)).is_none());
        assert_eq!(
            client.fetch("https://a", &Payload::Empty, "GET", &HeaderMap::new()),
            Ok(true)
        );

        // Resolved once: swapping the registered hook does not rebind the client.
        let second = hook(&transports);
        second
            .enable(Some(Arc::new(|_: &Request| {
                Some(Response::new(200, HeaderMap::new(), "cached"))
            })))
            .expect("enable");
        install_hook(second);
        transports.transport.push_success(200, "", "live again");
        assert_eq!(
            client.fetch("https://a", &Payload::Empty, "GET", &HeaderMap::new()),
            Ok(true)
        );
        assert_eq!(client.last_response().as_deref(), Some("live again"));

        assert!(clear_hook().is_some());
        assert!(registered_hook().is_none());
    }
}
