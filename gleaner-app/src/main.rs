use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command, ImportArgs};
use gleaner_common::observability::{LogConfig, LogFormat, init_logging};
use gleaner_config::{GleanerConfig, GleanerConfigLoader, LogFormatKind, LoggingConfig};
use gleaner_core::{BridgeOptions, ImportBridge};
use gleaner_drivers::WebDriverLauncher;
use gleaner_runtime::GleanerRuntime;
use host::ImportPolicy;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};
mod cli;
mod host;

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(target: "gleaner.host", error = %err, "import failed");
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Import(args) => import(args),
    }
}

fn load_config(path: Option<&Path>) -> Result<GleanerConfig> {
    let loader = match path {
        Some(path) => GleanerConfigLoader::new().with_file(path),
        None => GleanerConfigLoader::new().with_optional_file("gleaner.yaml"),
    };
    loader.load().context("loading configuration")
}

fn log_config(logging: &LoggingConfig) -> LogConfig {
    LogConfig {
        log_dir: logging.dir.clone(),
        emit_stderr: logging.emit_stderr,
        format: match logging.format {
            LogFormatKind::Text => LogFormat::Text,
            LogFormatKind::Json => LogFormat::Json,
        },
        default_filter: logging.filter.clone(),
        ..LogConfig::default()
    }
}

fn import(args: ImportArgs) -> Result<()> {
    let cfg = load_config(args.config.as_deref())?;
    let log_path = init_logging(log_config(&cfg.logging))?;
    debug!(target: "gleaner.host", log = %log_path.display(), "logging initialised");

    let mut webdriver = cfg.webdriver.clone();
    webdriver.headless |= args.headless;
    let policy = ImportPolicy {
        normalize_guide_urls: cfg.bridge.normalize_guide_urls,
        require_text: cfg.bridge.require_text && !args.allow_empty,
    };

    let runtime = GleanerRuntime::build("gleaner", None)?;
    runtime.reclaim_on_interrupt();
    let bridge = ImportBridge::new(
        Arc::new(WebDriverLauncher::new(webdriver)),
        BridgeOptions {
            max_concurrent_sessions: cfg.bridge.max_concurrent_sessions,
        },
    )
    .with_reclaim(runtime.handle().reclaim_token());

    let outcome = runtime.block_on(host::import(&bridge, &args.url, policy));
    runtime.shutdown(Duration::from_secs(2));
    let payload = outcome?;

    let rendered = host::render(&payload, args.json)?;
    match args.output {
        Some(path) => std::fs::write(&path, rendered)
            .with_context(|| format!("writing {}", path.display()))?,
        None => print!("{rendered}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn logging_section_maps_onto_log_config() {
        let logging = LoggingConfig {
            format: LogFormatKind::Json,
            emit_stderr: true,
            filter: "gleaner=debug".into(),
            dir: Some("/tmp/gleaner-logs".into()),
        };
        let config = log_config(&logging);
        assert_eq!(config.app_name, "gleaner");
        assert_eq!(config.format, LogFormat::Json);
        assert!(config.emit_stderr);
        assert_eq!(config.default_filter, "gleaner=debug");
        assert_eq!(config.log_dir.as_deref(), Some(Path::new("/tmp/gleaner-logs")));
    }

    #[test]
    fn explicit_config_file_is_loaded() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "bridge:\n  require_text: false\nwebdriver:\n  browser: firefox").unwrap();
        let cfg = load_config(Some(file.path())).unwrap();
        assert!(!cfg.bridge.require_text);
        assert_eq!(cfg.webdriver.browser, gleaner_config::BrowserKind::Firefox);
    }

    #[test]
    fn missing_explicit_config_file_is_an_error() {
        assert!(load_config(Some(Path::new("/nonexistent/gleaner.yaml"))).is_err());
    }
}
