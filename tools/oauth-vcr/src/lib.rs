pub mod cassette;
pub mod config;
pub mod errors;
pub mod hook;
pub mod interaction;
pub mod loader;
pub mod logging;
pub mod proxy;
pub mod registry;
pub mod rewriter;
pub mod runtime;
pub mod transport;

use clap::{error::ErrorKind, Parser};
use config::{load_config, CliOverrides};
use errors::VcrError;
use loader::{SourceLoader, TransformingLoader};
use logging::{append_run_log, clear_run_logger, init_run_logger};
use runtime::ProductionRuntime;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Parser)]
#[command(name = "oauth-vcr")]
#[command(about = "Redirect native OAuth client construction sites to the recording proxy client")]
pub struct Cli {
    /// Source file to rewrite.
    #[arg(long)]
    pub input: PathBuf,
    /// Write the rewritten source here instead of stdout.
    #[arg(long)]
    pub output: Option<PathBuf>,
    #[arg(long)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub native_type: Option<String>,
    #[arg(long)]
    pub adapter_type: Option<String>,
    #[arg(long = "run-log")]
    pub run_log: Option<PathBuf>,
    /// Exit 1 if the input would be rewritten; write nothing.
    #[arg(long, default_value_t = false)]
    pub check: bool,
}

pub fn run() -> Result<i32, VcrError> {
    let args = std::env::args_os().collect::<Vec<_>>();
    let runtime = ProductionRuntime::new();
    run_with_runtime(&args, &runtime)
}

pub fn run_with_runtime(
    args: &[std::ffi::OsString],
    runtime: &ProductionRuntime,
) -> Result<i32, VcrError> {
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => match error.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                print!("{error}");
                return Ok(0);
            }
            _ => return Err(VcrError::Cli(error.to_string())),
        },
    };

    let overrides = CliOverrides {
        config_path: cli.config.clone(),
        native_type: cli.native_type.clone(),
        adapter_type: cli.adapter_type.clone(),
        run_log_path: cli.run_log.clone(),
    };
    let cfg = load_config(&overrides, runtime.file_system.as_ref())?;

    let logging = cfg.run_logger();
    if let Some(logger) = logging.clone() {
        init_run_logger(logger);
    }
    let result = rewrite_file(&cli, &cfg, runtime);
    if logging.is_some() {
        clear_run_logger();
    }
    result
}

fn rewrite_file(
    cli: &Cli,
    cfg: &config::VcrConfig,
    runtime: &ProductionRuntime,
) -> Result<i32, VcrError> {
    let rewriter = Arc::new(cfg.build_rewriter()?);
    let loader = TransformingLoader::new(Arc::clone(&runtime.file_system));
    rewriter.register(&loader);
    loader.intercept();

    let original = runtime.file_system.read_to_string(&cli.input)?;
    let rewritten = loader.transform_source(&original);
    let changed = rewritten != original;
    append_run_log(
        "info",
        "rewrite.completed",
        json!({
            "input": cli.input.display().to_string(),
            "changed": changed,
            "check": cli.check
        }),
    );

    if cli.check {
        let verdict = if changed { "would rewrite" } else { "unchanged" };
        runtime
            .terminal
            .write_line(&format!("{}: {verdict}", cli.input.display()))?;
        return Ok(i32::from(changed));
    }

    match &cli.output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                runtime.file_system.create_dir_all(parent)?;
            }
            runtime.file_system.write_string(path, &rewritten)?;
            runtime.terminal.write_line(&format!(
                "rewrote {} -> {}",
                cli.input.display(),
                path.display()
            ))?;
        }
        None => {
            let text = rewritten.strip_suffix('\n').unwrap_or(&rewritten);
            runtime.terminal.write_line(text)?;
        }
    }
    Ok(0)
}
