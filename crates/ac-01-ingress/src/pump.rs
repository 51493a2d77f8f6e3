//! Rate-limited publisher.
//!
//! A token bucket with a burst of one spaces publishes evenly at `rps` per
//! second. Publish failures are counted and the run continues. The bus is
//! flushed once the run ends so buffered records are not lost on exit.

use crate::errors::IngressError;
use bytes::Bytes;
use crash_telemetry::{metric_inc, INGRESS_PUBLISHED};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use shared_bus::{MessageBus, ShutdownSignal};
use shared_types::FlightCrash;
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Default publish rate.
pub const DEFAULT_RPS: u32 = 10;

const PROGRESS_EVERY: u64 = 100;

/// Outcome of one ingress run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpReport {
    pub published: u64,
    pub failed: u64,
    /// CSV rows that never became records.
    pub skipped: usize,
    /// The run stopped before the input was exhausted.
    pub cancelled: bool,
}

pub struct Pump {
    bus: Arc<dyn MessageBus>,
    topic: String,
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl Pump {
    pub fn new(
        bus: Arc<dyn MessageBus>,
        topic: impl Into<String>,
        rps: u32,
    ) -> Result<Self, IngressError> {
        let rate = NonZeroU32::new(rps).ok_or(IngressError::InvalidRate)?;
        let quota = Quota::per_second(rate).allow_burst(NonZeroU32::MIN);
        Ok(Self {
            bus,
            topic: topic.into(),
            limiter: RateLimiter::direct(quota),
        })
    }

    /// Publish `records` in order until they run out or `shutdown` fires.
    pub async fn run<I>(&self, records: I, shutdown: ShutdownSignal) -> PumpReport
    where
        I: IntoIterator<Item = FlightCrash>,
    {
        let mut report = PumpReport::default();
        for record in records {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    report.cancelled = true;
                    break;
                }
                _ = self.limiter.until_ready() => {}
            }

            if self.publish(&record).await {
                report.published += 1;
            } else {
                report.failed += 1;
            }
            let sent = report.published + report.failed;
            if sent % PROGRESS_EVERY == 0 {
                info!(published = report.published, failed = report.failed, "Ingress progress");
            }
        }

        if let Err(e) = self.bus.flush().await {
            error!(topic = %self.topic, error = %e, "Flush after ingress failed");
        }

        info!(
            topic = %self.topic,
            published = report.published,
            failed = report.failed,
            cancelled = report.cancelled,
            "Ingress finished"
        );
        report
    }

    async fn publish(&self, record: &FlightCrash) -> bool {
        let payload = match record.to_json() {
            Ok(payload) => Bytes::from(payload),
            Err(e) => {
                warn!(location = %record.location, error = %e, "Record could not be encoded");
                metric_inc!(INGRESS_PUBLISHED, &["error"]);
                return false;
            }
        };
        match self.bus.publish(&self.topic, payload).await {
            Ok(()) => {
                debug!(topic = %self.topic, location = %record.location, "Published");
                metric_inc!(INGRESS_PUBLISHED, &["ok"]);
                true
            }
            Err(e) => {
                error!(topic = %self.topic, error = %e, "Publish failed");
                metric_inc!(INGRESS_PUBLISHED, &["error"]);
                false
            }
        }
    }
}
