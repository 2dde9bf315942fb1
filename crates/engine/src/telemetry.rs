use tracing_subscriber::EnvFilter;

use greenlight_core::config::{AppConfig, LogFormat};

/// Install the global tracing subscriber from the `[logging]` config
/// section. Call once at process start, before any engine operation runs.
///
/// The level string is a full filter directive, so `info` and
/// `greenlight_engine=debug,info` both work.
pub fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    match config.logging.format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Json => builder.json().init(),
    }
}
