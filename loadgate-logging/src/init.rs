use anyhow::Result;
use loadgate_config::{LogFormat, LoggingConfig};
use tracing_subscriber::EnvFilter;

/// Build the filter for a configuration: explicit directives win, then
/// `RUST_LOG`, then the configured level
fn env_filter(config: &LoggingConfig) -> EnvFilter {
    let directives = match &config.filter {
        Some(filter) => format!("{},{}", config.level, filter),
        None => config.level.to_string(),
    };

    EnvFilter::try_new(directives)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize logging from configuration
pub fn init_logging_from_config(config: &LoggingConfig) -> Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(config))
        .with_ansi(config.ansi)
        .with_file(config.include_location)
        .with_line_number(config.include_location);

    // Use try_init to avoid panic if global subscriber already set
    let result = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Text => builder.try_init(),
    };

    if result.is_err() {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    Ok(())
}

/// Initialize simple tracing for basic console output
pub fn init_simple_tracing(log_level: &str) -> Result<()> {
    let env_filter = EnvFilter::try_new(log_level)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if tracing_subscriber::fmt().with_env_filter(env_filter).try_init().is_err() {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    Ok(())
}
