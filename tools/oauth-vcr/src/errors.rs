use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VcrError {
    #[error("fetch hook must be enabled before intercepting requests")]
    HookDisabled,
    #[error("missing native capability: {0}")]
    MissingNativeCapability(String),
    #[error("invalid callback: {0}")]
    InvalidCallback(String),
    #[error("no fetch hook registered at the composition root")]
    NoHookRegistered,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("invalid rewrite pattern: {0}")]
    InvalidPattern(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("config parse error: {0}")]
    ConfigParse(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("cli error: {0}")]
    Cli(String),
}
