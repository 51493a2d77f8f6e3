//! Re-publishes enriched records to the output topic.
//!
//! Failures are logged and counted; they never reach the indexing path.

use bytes::Bytes;
use crash_telemetry::REPUBLISH_FAILURES;
use shared_bus::MessageBus;
use shared_types::FlightCrash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{trace, warn};

pub struct Republisher {
    bus: Arc<dyn MessageBus>,
    topic: String,
    published: AtomicU64,
    failures: AtomicU64,
}

impl Republisher {
    pub fn new(bus: Arc<dyn MessageBus>, topic: impl Into<String>) -> Self {
        Self {
            bus,
            topic: topic.into(),
            published: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Publish `record`. Returns whether it went out.
    pub async fn publish(&self, record: &FlightCrash) -> bool {
        let payload = match record.to_json() {
            Ok(payload) => Bytes::from(payload),
            Err(e) => {
                self.fail();
                warn!(topic = %self.topic, error = %e, "Enriched record could not be encoded");
                return false;
            }
        };
        match self.bus.publish(&self.topic, payload).await {
            Ok(()) => {
                self.published.fetch_add(1, Ordering::Relaxed);
                trace!(topic = %self.topic, location = %record.location, "Enriched record re-published");
                true
            }
            Err(e) => {
                self.fail();
                warn!(topic = %self.topic, error = %e, "Re-publish failed");
                false
            }
        }
    }

    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    fn fail(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        REPUBLISH_FAILURES.inc();
    }
}
