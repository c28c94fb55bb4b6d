use std::fs::File;
use std::sync::Arc;

use tracing::Level;
use tracing_subscriber::{
    filter::LevelFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::LoggingConfig;

/// Initialize structured logging based on configuration
///
/// Supports both JSON (production) and pretty (development) formats
/// with configurable log levels and optional file output. The configured
/// level is the default directive; `RUST_LOG` directives are layered on top.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let level = parse_log_level(&config.level)?;
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();

    let registry = tracing_subscriber::registry().with(env_filter);
    let file = config.file_path.as_deref().map(open_log_file).transpose()?;

    if config.format.as_str() == "json" {
        let json_layer = fmt::layer()
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .with_current_span(true)
            .with_target(true)
            .with_line_number(true);

        match file {
            Some(file) => registry.with(json_layer.with_writer(file)).try_init()?,
            None => registry.with(json_layer).try_init()?,
        }
    } else {
        let pretty_layer = fmt::layer()
            .pretty()
            .with_span_events(FmtSpan::CLOSE)
            .with_target(true)
            .with_file(false);

        match file {
            Some(file) => registry
                .with(pretty_layer.with_writer(file).with_ansi(false))
                .try_init()?,
            None => registry.with(pretty_layer).try_init()?,
        }
    }

    Ok(())
}

fn open_log_file(path: &str) -> anyhow::Result<Arc<File>> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| anyhow::anyhow!("Failed to open log file {path}: {e}"))?;
    Ok(Arc::new(file))
}

/// Parse a configured level name, also used by config validation
pub(crate) fn parse_log_level(level: &str) -> anyhow::Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" | "warning" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(anyhow::anyhow!("Invalid log level: {level}")),
    }
}
