//! # Crash Telemetry
//!
//! Observability for the air-crash pipeline: structured `tracing` output and
//! Prometheus metrics scraped from each process's `/metrics` endpoint.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use crash_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let config = TelemetryConfig::for_role("indexer");
//! init_telemetry(&config)?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `AC_SERVICE_NAME` | `air-crash` | Service name in logs |
//! | `AC_LOG_LEVEL` | `info` | Log level filter (falls back to `RUST_LOG`) |
//! | `AC_JSON_LOGS` | `false` (`true` in containers) | JSON log lines |

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::init_logging;
pub use metrics::{
    encode_metrics, register_metrics, HistogramTimer, BULK_FLUSHES, BULK_FLUSH_DURATION,
    BULK_ITEM_FAILURES, FEED_BROADCASTS, FEED_EVICTIONS, FEED_LISTENERS, GEOCODE_REQUESTS,
    INGRESS_PUBLISHED, INGRESS_ROWS_SKIPPED, RECORDS_INDEXED, REPUBLISH_FAILURES,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Register metrics and install the log subscriber.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    register_metrics()?;
    init_logging(config)
}

/// Convenience macro for recording a metric increment.
#[macro_export]
macro_rules! metric_inc {
    ($metric:expr) => {
        $metric.inc()
    };
    ($metric:expr, $labels:expr) => {
        $metric.with_label_values($labels).inc()
    };
}
