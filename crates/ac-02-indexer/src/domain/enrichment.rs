//! # Enrichment Stage
//!
//! One geocoding lookup per record, keyed by its free-text location.
//! Failures never stop the pipeline: the record passes through unchanged and
//! the failure is counted by cause.

use crate::ports::Geocoder;
use crash_telemetry::{metric_inc, GEOCODE_REQUESTS};
use shared_types::FlightCrash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Upper bound on a single lookup.
pub const DEFAULT_GEOCODE_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of enriching one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichmentOutcome {
    /// Coordinates attached.
    Enriched,
    /// The service answered but found nothing (or there was nothing to ask).
    NoMatch,
    /// The service failed or timed out.
    ServiceError,
}

impl EnrichmentOutcome {
    /// Metric label for this outcome.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Enriched => "ok",
            Self::NoMatch => "no_match",
            Self::ServiceError => "service_error",
        }
    }

    #[must_use]
    pub fn is_enriched(self) -> bool {
        self == Self::Enriched
    }
}

/// Per-instance outcome counters.
#[derive(Debug, Default)]
pub struct EnrichmentStats {
    enriched: AtomicU64,
    no_match: AtomicU64,
    service_error: AtomicU64,
}

impl EnrichmentStats {
    pub fn enriched(&self) -> u64 {
        self.enriched.load(Ordering::Relaxed)
    }

    pub fn no_match(&self) -> u64 {
        self.no_match.load(Ordering::Relaxed)
    }

    pub fn service_error(&self) -> u64 {
        self.service_error.load(Ordering::Relaxed)
    }

    fn record(&self, outcome: EnrichmentOutcome) {
        let counter = match outcome {
            EnrichmentOutcome::Enriched => &self.enriched,
            EnrichmentOutcome::NoMatch => &self.no_match,
            EnrichmentOutcome::ServiceError => &self.service_error,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        metric_inc!(GEOCODE_REQUESTS, &[outcome.label()]);
    }
}

/// Attaches coordinates to records.
pub struct Enricher {
    geocoder: Arc<dyn Geocoder>,
    timeout: Duration,
    stats: Arc<EnrichmentStats>,
}

impl Enricher {
    pub fn new(geocoder: Arc<dyn Geocoder>) -> Self {
        Self::with_timeout(geocoder, DEFAULT_GEOCODE_TIMEOUT)
    }

    pub fn with_timeout(geocoder: Arc<dyn Geocoder>, timeout: Duration) -> Self {
        Self {
            geocoder,
            timeout,
            stats: Arc::new(EnrichmentStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<EnrichmentStats> {
        Arc::clone(&self.stats)
    }

    /// Enrich one record.
    ///
    /// On success the returned record is a copy carrying the first result's
    /// coordinates; otherwise the input comes back untouched.
    pub async fn enrich(&self, record: FlightCrash) -> (FlightCrash, EnrichmentOutcome) {
        let (record, outcome) = self.lookup(record).await;
        self.stats.record(outcome);
        (record, outcome)
    }

    async fn lookup(&self, record: FlightCrash) -> (FlightCrash, EnrichmentOutcome) {
        let address = record.location.trim();
        if address.is_empty() {
            debug!("Record has no location, skipping geocoding");
            return (record, EnrichmentOutcome::NoMatch);
        }

        let answer = tokio::time::timeout(self.timeout, self.geocoder.geocode(address)).await;
        match answer {
            Ok(Ok(results)) => match results.first() {
                Some(location) => {
                    let enriched = record.with_location_gps(*location);
                    (enriched, EnrichmentOutcome::Enriched)
                }
                None => {
                    warn!(location = %record.location, "No coordinates found for location");
                    (record, EnrichmentOutcome::NoMatch)
                }
            },
            Ok(Err(e)) => {
                warn!(location = %record.location, error = %e, "Geocoding failed");
                (record, EnrichmentOutcome::ServiceError)
            }
            Err(_) => {
                warn!(
                    location = %record.location,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Geocoding timed out"
                );
                (record, EnrichmentOutcome::ServiceError)
            }
        }
    }
}
