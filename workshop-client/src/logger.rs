//! Logging setup
//!
//! Console logging through `tracing-subscriber`. `RUST_LOG` overrides the
//! level passed in. Pretty output for development, JSON for production.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber.
///
/// # Arguments
/// * `level` - Log level (e.g., "info", "debug", "workshop_client=trace")
/// * `json_format` - JSON lines instead of human readable output
///
/// # Errors
/// Fails if a global subscriber is already installed.
///
/// # Examples
/// ```no_run
/// workshop_client::logger::init_logger("debug", false)?;
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn init_logger(level: &str, json_format: bool) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::registry().with(env_filter);

    if json_format {
        let console_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true);
        subscriber.with(console_layer).try_init()?;
    } else {
        let console_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(true)
            .with_line_number(true);
        subscriber.with(console_layer).try_init()?;
    }

    Ok(())
}

/// Level and format from `WORKSHOP_LOG_LEVEL` / `WORKSHOP_LOG_JSON`
pub fn init_logger_from_env() -> anyhow::Result<()> {
    let level = std::env::var("WORKSHOP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let json = std::env::var("WORKSHOP_LOG_JSON")
        .ok()
        .and_then(|v| v.parse::<bool>().ok())
        .unwrap_or(false);
    init_logger(&level, json)
}
