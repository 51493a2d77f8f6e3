//! Prometheus metrics for the air-crash pipeline.
//!
//! All metrics follow the naming convention: `ac_<stage>_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: Monotonically increasing value (e.g., records_indexed_total)
//! - **Gauge**: Value that can go up or down (e.g., feed listeners)
//! - **Histogram**: Distribution of values (e.g., bulk flush duration)

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Counter, CounterVec, Encoder, Gauge, Histogram, HistogramOpts, Opts,
    Registry, TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // ENRICHMENT METRICS
    // =========================================================================

    /// Geocoding calls by outcome: ok, no_match, service_error
    pub static ref GEOCODE_REQUESTS: CounterVec = CounterVec::new(
        Opts::new("ac_geocode_requests_total", "Geocoding lookups by outcome"),
        &["outcome"]
    ).expect("metric creation failed");

    // =========================================================================
    // INDEXER METRICS
    // =========================================================================

    /// Documents accepted by the store
    pub static ref RECORDS_INDEXED: Counter = Counter::new(
        "ac_indexer_records_indexed_total",
        "Total records committed to the document store"
    ).expect("metric creation failed");

    /// Bulk flushes by outcome: ok, error
    pub static ref BULK_FLUSHES: CounterVec = CounterVec::new(
        Opts::new("ac_indexer_bulk_flushes_total", "Bulk requests sent to the store"),
        &["outcome"]
    ).expect("metric creation failed");

    /// Items the store rejected inside an accepted bulk request
    pub static ref BULK_ITEM_FAILURES: Counter = Counter::new(
        "ac_indexer_bulk_item_failures_total",
        "Documents rejected inside successful bulk requests"
    ).expect("metric creation failed");

    /// Bulk flush latency
    pub static ref BULK_FLUSH_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "ac_indexer_bulk_flush_duration_seconds",
            "Time spent executing one bulk request"
        ).buckets(exponential_buckets(0.001, 2.0, 15).expect("valid buckets"))
    ).expect("metric creation failed");

    /// Enriched records that could not be re-published
    pub static ref REPUBLISH_FAILURES: Counter = Counter::new(
        "ac_indexer_republish_failures_total",
        "Enriched records that failed to publish to the output topic"
    ).expect("metric creation failed");

    // =========================================================================
    // LIVE FEED METRICS
    // =========================================================================

    /// Currently registered listeners
    pub static ref FEED_LISTENERS: Gauge = Gauge::new(
        "ac_feed_listeners",
        "Live listeners registered with the hub"
    ).expect("metric creation failed");

    /// Listeners dropped by the hub: slow (buffer full), gone (receiver closed)
    pub static ref FEED_EVICTIONS: CounterVec = CounterVec::new(
        Opts::new("ac_feed_listener_evictions_total", "Listeners evicted from the hub by reason"),
        &["reason"]
    ).expect("metric creation failed");

    /// Records fanned out by the hub
    pub static ref FEED_BROADCASTS: Counter = Counter::new(
        "ac_feed_records_broadcast_total",
        "Records broadcast to live listeners"
    ).expect("metric creation failed");

    // =========================================================================
    // INGRESS METRICS
    // =========================================================================

    /// Publish attempts by outcome: ok, error
    pub static ref INGRESS_PUBLISHED: CounterVec = CounterVec::new(
        Opts::new("ac_ingress_published_total", "Records published by the ingress pump"),
        &["outcome"]
    ).expect("metric creation failed");

    /// CSV rows skipped as malformed
    pub static ref INGRESS_ROWS_SKIPPED: Counter = Counter::new(
        "ac_ingress_rows_skipped_total",
        "CSV rows that could not be parsed"
    ).expect("metric creation failed");
}

/// Register all metrics with the global registry. Safe to call repeatedly.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Enrichment
        Box::new(GEOCODE_REQUESTS.clone()),
        // Indexer
        Box::new(RECORDS_INDEXED.clone()),
        Box::new(BULK_FLUSHES.clone()),
        Box::new(BULK_ITEM_FAILURES.clone()),
        Box::new(BULK_FLUSH_DURATION.clone()),
        Box::new(REPUBLISH_FAILURES.clone()),
        // Live feed
        Box::new(FEED_LISTENERS.clone()),
        Box::new(FEED_EVICTIONS.clone()),
        Box::new(FEED_BROADCASTS.clone()),
        // Ingress
        Box::new(INGRESS_PUBLISHED.clone()),
        Box::new(INGRESS_ROWS_SKIPPED.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }
    Ok(())
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        self.histogram.observe(self.start.elapsed().as_secs_f64());
    }
}

/// Start timing for a histogram. Observation happens on drop.
#[macro_export]
macro_rules! time_histogram {
    ($histogram:expr) => {
        $crate::metrics::HistogramTimer::new(&$histogram)
    };
}
