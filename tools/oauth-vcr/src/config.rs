use crate::errors::VcrError;
use crate::hook::HookOptions;
use crate::logging::{JsonlLogger, DEFAULT_MAX_PAYLOAD_BYTES};
use crate::proxy::DisabledPolicy;
use crate::rewriter::{PatternRewriter, DEFAULT_ADAPTER_TYPE, DEFAULT_NATIVE_TYPE};
use crate::runtime::FileSystem;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_path: Option<PathBuf>,
    pub native_type: Option<String>,
    pub adapter_type: Option<String>,
    pub run_log_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VcrConfig {
    pub rewriter: RewriterConfig,
    pub hook: HookConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RewriterConfig {
    pub native_type: String,
    pub adapter_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HookConfig {
    pub disabled_policy: DisabledPolicy,
    pub match_extra_parameters: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    pub run_log_path: Option<PathBuf>,
    pub max_payload_bytes: usize,
}

impl Default for VcrConfig {
    fn default() -> Self {
        Self {
            rewriter: RewriterConfig {
                native_type: DEFAULT_NATIVE_TYPE.to_string(),
                adapter_type: DEFAULT_ADAPTER_TYPE.to_string(),
            },
            hook: HookConfig {
                disabled_policy: DisabledPolicy::PassThrough,
                match_extra_parameters: false,
            },
            logging: LoggingConfig {
                run_log_path: None,
                max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            },
        }
    }
}

impl VcrConfig {
    pub fn build_rewriter(&self) -> Result<PatternRewriter, VcrError> {
        PatternRewriter::new(&self.rewriter.native_type, &self.rewriter.adapter_type)
    }

    pub fn hook_options(&self) -> HookOptions {
        HookOptions {
            match_extra_parameters: self.hook.match_extra_parameters,
        }
    }

    /// Run logger for the configured path, if any.
    pub fn run_logger(&self) -> Option<JsonlLogger> {
        self.logging.run_log_path.as_ref().map(|path| {
            let mut logger = JsonlLogger::new(path);
            logger.max_payload_bytes = self.logging.max_payload_bytes;
            logger
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PartialVcrConfig {
    rewriter: Option<PartialRewriterConfig>,
    hook: Option<PartialHookConfig>,
    logging: Option<PartialLoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PartialRewriterConfig {
    native_type: Option<String>,
    adapter_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PartialHookConfig {
    disabled_policy: Option<DisabledPolicy>,
    match_extra_parameters: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PartialLoggingConfig {
    run_log_path: Option<PathBuf>,
    max_payload_bytes: Option<usize>,
}

pub fn load_config(overrides: &CliOverrides, fs: &dyn FileSystem) -> Result<VcrConfig, VcrError> {
    let mut cfg = VcrConfig::default();

    if let Some(path) = &overrides.config_path {
        let file_contents = fs.read_to_string(path)?;
        let partial: PartialVcrConfig = toml::from_str(&file_contents)
            .map_err(|e| VcrError::ConfigParse(e.to_string()))?;
        merge_partial_config(&mut cfg, partial);
    }

    apply_cli_overrides(&mut cfg, overrides);
    validate_config(&cfg)?;
    Ok(cfg)
}

fn merge_partial_config(cfg: &mut VcrConfig, partial: PartialVcrConfig) {
    if let Some(rewriter) = partial.rewriter {
        if let Some(native_type) = rewriter.native_type {
            cfg.rewriter.native_type = native_type;
        }
        if let Some(adapter_type) = rewriter.adapter_type {
            cfg.rewriter.adapter_type = adapter_type;
        }
    }

    if let Some(hook) = partial.hook {
        if let Some(policy) = hook.disabled_policy {
            cfg.hook.disabled_policy = policy;
        }
        if let Some(value) = hook.match_extra_parameters {
            cfg.hook.match_extra_parameters = value;
        }
    }

    if let Some(logging) = partial.logging {
        if let Some(path) = logging.run_log_path {
            cfg.logging.run_log_path = Some(path);
        }
        if let Some(value) = logging.max_payload_bytes {
            cfg.logging.max_payload_bytes = value;
        }
    }
}

fn apply_cli_overrides(cfg: &mut VcrConfig, overrides: &CliOverrides) {
    if let Some(native_type) = &overrides.native_type {
        cfg.rewriter.native_type = native_type.clone();
    }
    if let Some(adapter_type) = &overrides.adapter_type {
        cfg.rewriter.adapter_type = adapter_type.clone();
    }
    if let Some(path) = &overrides.run_log_path {
        cfg.logging.run_log_path = Some(path.clone());
    }
}

pub fn validate_config(cfg: &VcrConfig) -> Result<(), VcrError> {
    if cfg.rewriter.native_type.trim().is_empty() {
        return Err(VcrError::InvalidConfig(
            "rewriter.native_type must not be empty".to_string(),
        ));
    }
    if cfg.rewriter.adapter_type.trim().is_empty() {
        return Err(VcrError::InvalidConfig(
            "rewriter.adapter_type must not be empty".to_string(),
        ));
    }
    if cfg.logging.max_payload_bytes == 0 {
        return Err(VcrError::InvalidConfig(
            "logging.max_payload_bytes must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::FakeFileSystem;

    fn overrides_for(path: &str) -> CliOverrides {
        CliOverrides {
            config_path: Some(PathBuf::from(path)),
            ..CliOverrides::default()
        }
    }

    #[test]
    fn defaults_without_config_file() {
        let cfg = load_config(&CliOverrides::default(), &FakeFileSystem::default()).expect("cfg");
        assert_eq!(cfg, VcrConfig::default());
        assert_eq!(cfg.hook.disabled_policy, DisabledPolicy::PassThrough);
        assert!(cfg.run_logger().is_none());
    }

    #[test]
    fn partial_file_merges_over_defaults() {
        let fs = FakeFileSystem::with_file(
            "/vcr.toml",
            "[hook]\ndisabled_policy = \"refuse\"\n\n[logging]\nrun_log_path = \"/tmp/run.jsonl\"\n",
        );
        let cfg = load_config(&overrides_for("/vcr.toml"), &fs).expect("cfg");
        assert_eq!(cfg.hook.disabled_policy, DisabledPolicy::Refuse);
        assert!(!cfg.hook_options().match_extra_parameters);
        assert_eq!(cfg.rewriter.native_type, "OAuth");
        assert_eq!(
            cfg.run_logger().map(|l| l.path),
            Some(PathBuf::from("/tmp/run.jsonl"))
        );
    }

    #[test]
    fn cli_overrides_win_over_file() {
        let fs = FakeFileSystem::with_file("/vcr.toml", "[rewriter]\nnative_type = \"Signer\"\n");
        let overrides = CliOverrides {
            native_type: Some("Client".to_string()),
            ..overrides_for("/vcr.toml")
        };
        let cfg = load_config(&overrides, &fs).expect("cfg");
        assert_eq!(cfg.rewriter.native_type, "Client");
        let rewriter = cfg.build_rewriter().expect("rewriter");
        assert_eq!(rewriter.native_type(), "Client");
    }

    #[test]
    fn rejects_unknown_keys_and_bad_values() {
        let fs = FakeFileSystem::with_file("/bad.toml", "[hook]\nmode = \"strict\"\n");
        assert!(matches!(
            load_config(&overrides_for("/bad.toml"), &fs),
            Err(VcrError::ConfigParse(_))
        ));

        let fs = FakeFileSystem::with_file("/zero.toml", "[logging]\nmax_payload_bytes = 0\n");
        assert!(matches!(
            load_config(&overrides_for("/zero.toml"), &fs),
            Err(VcrError::InvalidConfig(_))
        ));
    }

    #[test]
    fn missing_config_file_is_an_io_error() {
        assert!(matches!(
            load_config(&overrides_for("/nope.toml"), &FakeFileSystem::default()),
            Err(VcrError::Io(_))
        ));
    }
}
