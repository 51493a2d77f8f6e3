//! Structured logging setup.
//!
//! Human-readable output for development, JSON lines for containers so a log
//! shipper can parse fields without regexes.

use tracing_subscriber::EnvFilter;

use crate::{TelemetryConfig, TelemetryError};

/// Install the global `tracing` subscriber.
///
/// Fails if a subscriber is already installed or the filter does not parse.
pub fn init_logging(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_new(&config.log_level)
        .map_err(|e| TelemetryError::Config(format!("invalid log filter: {e}")))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true);

    let installed = if config.json_logs {
        builder.json().with_current_span(false).try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;

    tracing::debug!(
        service = %config.service_name,
        json_logs = config.json_logs,
        "Logging initialized"
    );
    Ok(())
}

/// Helper to create structured log entries tagged with the emitting stage.
#[macro_export]
macro_rules! log_event {
    (info, $stage:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::info!(stage = $stage, $($($field)*,)? $msg)
    };
    (warn, $stage:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::warn!(stage = $stage, $($($field)*,)? $msg)
    };
    (error, $stage:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::error!(stage = $stage, $($($field)*,)? $msg)
    };
    (debug, $stage:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::debug!(stage = $stage, $($($field)*,)? $msg)
    };
}
