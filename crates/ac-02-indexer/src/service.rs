//! Indexer service: wires the bus stream, enrichment, re-publication and the
//! bulk committer into one run.

use crate::adapters::{topics, Republisher};
use crate::domain::{BulkCommitter, CommitConfig, CommitReport, Enricher, IndexerError};
use futures::StreamExt;
use shared_bus::{open, MessageBus, ShutdownSignal, SubscriptionTarget};
use shared_store::DocumentStore;
use shared_types::FlightCrash;
use std::sync::Arc;
use tracing::info;

/// Indexer wiring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexerConfig {
    pub topic: String,
    /// Replicas sharing a group split the input between them.
    pub queue_group: Option<String>,
    pub out_topic: String,
    pub commit: CommitConfig,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            topic: topics::FLIGHTS.to_string(),
            queue_group: Some(topics::INDEXER_QUEUE_GROUP.to_string()),
            out_topic: topics::FLIGHTS_ENRICHED.to_string(),
            commit: CommitConfig::default(),
        }
    }
}

pub struct Indexer {
    bus: Arc<dyn MessageBus>,
    enricher: Arc<Enricher>,
    republisher: Arc<Republisher>,
    committer: BulkCommitter,
    config: IndexerConfig,
}

impl Indexer {
    pub fn new(
        bus: Arc<dyn MessageBus>,
        store: Arc<dyn DocumentStore>,
        enricher: Enricher,
        config: IndexerConfig,
    ) -> Result<Self, IndexerError> {
        let committer = BulkCommitter::new(store, config.commit.clone())?;
        let republisher = Republisher::new(Arc::clone(&bus), config.out_topic.clone());
        Ok(Self {
            bus,
            enricher: Arc::new(enricher),
            republisher: Arc::new(republisher),
            committer,
            config,
        })
    }

    pub fn enricher(&self) -> &Enricher {
        &self.enricher
    }

    pub fn republisher(&self) -> &Republisher {
        &self.republisher
    }

    /// Index records until `shutdown` fires, then flush and return totals.
    pub async fn run(&self, shutdown: ShutdownSignal) -> Result<CommitReport, IndexerError> {
        let target = match &self.config.queue_group {
            Some(group) => SubscriptionTarget::queue(&self.config.topic, group),
            None => SubscriptionTarget::topic(&self.config.topic),
        };
        let records = open::<FlightCrash>(self.bus.as_ref(), target, shutdown).await?;
        info!(
            topic = %self.config.topic,
            out_topic = %self.config.out_topic,
            index = %self.config.commit.index,
            bulk_size = self.config.commit.bulk_size,
            "Start indexing flights"
        );

        let enricher = Arc::clone(&self.enricher);
        let republisher = Arc::clone(&self.republisher);
        let enriched = records.then(move |record| {
            let enricher = Arc::clone(&enricher);
            let republisher = Arc::clone(&republisher);
            async move {
                let (record, outcome) = enricher.enrich(record).await;
                if outcome.is_enriched() {
                    republisher.publish(&record).await;
                }
                record
            }
        });

        self.committer.commit(enriched).await
    }
}
