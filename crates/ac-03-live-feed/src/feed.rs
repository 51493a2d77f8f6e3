//! Bus-to-hub bridge.
//!
//! Every server instance must see every enriched record, so the feed uses a
//! plain subscription and never a queue group.

use crate::errors::FeedError;
use crate::hub::HubHandle;
use shared_bus::{open, MessageBus, ShutdownSignal, SubscriptionTarget};
use shared_types::FlightCrash;
use std::sync::Arc;
use tracing::{info, trace, warn};

pub struct LiveFeed {
    bus: Arc<dyn MessageBus>,
    hub: HubHandle,
    topic: String,
}

impl LiveFeed {
    pub fn new(bus: Arc<dyn MessageBus>, hub: HubHandle, topic: impl Into<String>) -> Self {
        Self {
            bus,
            hub,
            topic: topic.into(),
        }
    }

    /// Forward records to the hub until `shutdown` fires. Returns how many
    /// records were forwarded.
    pub async fn run(&self, shutdown: ShutdownSignal) -> Result<u64, FeedError> {
        let mut records = open::<FlightCrash>(
            self.bus.as_ref(),
            SubscriptionTarget::topic(&self.topic),
            shutdown,
        )
        .await?;
        info!(topic = %self.topic, "Live feed subscribed");

        let mut forwarded = 0u64;
        while let Some(record) = records.recv().await {
            trace!(location = %record.location, "Forwarding record to hub");
            if self.hub.broadcast(record).await.is_err() {
                warn!(topic = %self.topic, "Hub stopped, live feed exiting");
                break;
            }
            forwarded += 1;
        }

        let stats = records.stats();
        info!(
            topic = %self.topic,
            forwarded,
            malformed = stats.malformed(),
            "Live feed stopped"
        );
        Ok(forwarded)
    }
}
