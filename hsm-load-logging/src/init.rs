use anyhow::Result;
use hsm_load_config::{LogFormat, LogLevel, LoggingConfig};
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Connection-level crates that are too chatty below `warn`
const QUIET_TARGETS: &[&str] = &["hyper=warn", "hyper_util=warn", "rustls=warn", "h2=warn"];

/// Build the filter: `level_override`, then `RUST_LOG`, then `level`, then `info`
pub fn build_env_filter(level_override: Option<&str>, level: &str) -> EnvFilter {
    let filter = match level_override {
        Some(directive) => EnvFilter::try_new(directive).ok(),
        None => EnvFilter::try_from_default_env().ok(),
    }
    .or_else(|| EnvFilter::try_new(level).ok())
    .unwrap_or_else(|| EnvFilter::new("info"));

    QUIET_TARGETS.iter().fold(filter, |filter, directive| match directive.parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    })
}

/// Initialize logging from configuration
///
/// `level_override` (the CLI `--log-level` flag) wins over `RUST_LOG`, which
/// wins over the configured level. Calling this twice is harmless: the second
/// subscriber is dropped.
pub fn init_logging(config: &LoggingConfig, level_override: Option<LogLevel>) -> Result<()> {
    let env_filter = build_env_filter(level_override.as_ref().map(LogLevel::as_str), config.level.as_str());
    let location = config.include_location;
    let registry = tracing_subscriber::registry().with(env_filter);

    // Use try_init to avoid panic if global subscriber already set
    let result = match config.format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_file(location)
                    .with_line_number(location),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .pretty()
                    .with_writer(std::io::stderr)
                    .with_file(location)
                    .with_line_number(location),
            )
            .try_init(),
        LogFormat::Compact => registry
            .with(
                fmt::layer()
                    .compact()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .with_file(location)
                    .with_line_number(location),
            )
            .try_init(),
        LogFormat::Text => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_file(location)
                    .with_line_number(location),
            )
            .try_init(),
    };

    if result.is_err() {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    Ok(())
}

/// Initialize plain stderr logging at `warn`, for use before a config is loaded
///
/// `level_override` and `RUST_LOG` take precedence as in [`init_logging`].
pub fn init_simple_tracing(level_override: Option<LogLevel>) -> Result<()> {
    let env_filter = build_env_filter(level_override.as_ref().map(LogLevel::as_str), "warn");

    if tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init()
        .is_err()
    {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    Ok(())
}
