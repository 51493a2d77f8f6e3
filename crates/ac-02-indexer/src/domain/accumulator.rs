//! # Bulk Commit Accumulator
//!
//! Buffers records into batches of at most `bulk_size` operations and
//! commits each batch with a single bulk request.
//!
//! ## Flush rules
//!
//! - a batch is flushed as soon as it reaches `bulk_size`;
//! - the pending batch is flushed when the input stream ends, even if short;
//! - a failed flush ends the run; batches flushed before it stay committed.
//!
//! For N records and threshold T this issues exactly ⌈N/T⌉ bulk requests.

use crate::domain::errors::IndexerError;
use crash_telemetry::{
    metric_inc, time_histogram, BULK_FLUSHES, BULK_FLUSH_DURATION, BULK_ITEM_FAILURES,
    RECORDS_INDEXED,
};
use futures::{Stream, StreamExt};
use shared_store::{ensure_index, BulkOperation, DocumentStore};
use shared_types::FlightCrash;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Where and how to commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitConfig {
    pub index: String,
    pub bulk_size: usize,
}

impl Default for CommitConfig {
    fn default() -> Self {
        Self {
            index: crate::DEFAULT_INDEX.to_string(),
            bulk_size: crate::DEFAULT_BULK_SIZE,
        }
    }
}

/// Totals for one completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitReport {
    /// Documents the store accepted.
    pub committed: usize,
    /// Bulk requests issued.
    pub batches: usize,
    /// Documents the store rejected inside accepted bulk requests.
    pub item_failures: usize,
}

/// Commits a stream of records to a [`DocumentStore`] in batches.
pub struct BulkCommitter {
    store: Arc<dyn DocumentStore>,
    config: CommitConfig,
}

impl BulkCommitter {
    pub fn new(store: Arc<dyn DocumentStore>, config: CommitConfig) -> Result<Self, IndexerError> {
        if config.bulk_size == 0 {
            return Err(IndexerError::InvalidConfig("bulk_size must be at least 1".into()));
        }
        if config.index.trim().is_empty() {
            return Err(IndexerError::InvalidConfig("index name is empty".into()));
        }
        Ok(Self { store, config })
    }

    pub fn config(&self) -> &CommitConfig {
        &self.config
    }

    /// Consume `records` until the stream ends, committing as it goes.
    pub async fn commit<S>(&self, records: S) -> Result<CommitReport, IndexerError>
    where
        S: Stream<Item = FlightCrash>,
    {
        ensure_index(self.store.as_ref(), &self.config.index)
            .await
            .map_err(IndexerError::IndexInit)?;

        futures::pin_mut!(records);
        let mut batch = Vec::with_capacity(self.config.bulk_size);
        let mut report = CommitReport::default();

        while let Some(record) = records.next().await {
            let Some(operation) = self.operation_for(record) else {
                continue;
            };
            batch.push(operation);
            if batch.len() >= self.config.bulk_size {
                self.flush(&mut batch, &mut report).await?;
            }
        }

        if !batch.is_empty() {
            self.flush(&mut batch, &mut report).await?;
        }

        info!(
            index = %self.config.index,
            committed = report.committed,
            batches = report.batches,
            "Record stream ended, all batches flushed"
        );
        Ok(report)
    }

    fn operation_for(&self, record: FlightCrash) -> Option<BulkOperation> {
        let record = if record.has_id() {
            record
        } else {
            record.with_id(Uuid::new_v4().to_string())
        };
        match serde_json::to_value(&record) {
            Ok(document) => Some(BulkOperation::index(&self.config.index, record.id, document)),
            Err(e) => {
                warn!(id = %record.id, error = %e, "Record could not be encoded, skipped");
                None
            }
        }
    }

    async fn flush(
        &self,
        batch: &mut Vec<BulkOperation>,
        report: &mut CommitReport,
    ) -> Result<(), IndexerError> {
        let operations = std::mem::replace(batch, Vec::with_capacity(self.config.bulk_size));
        let size = operations.len();
        debug!(size, "Flushing batch");

        let _timer = time_histogram!(BULK_FLUSH_DURATION);
        match self.store.bulk(operations).await {
            Ok(response) => {
                let accepted = size.saturating_sub(response.failed);
                report.batches += 1;
                report.committed += accepted;
                report.item_failures += response.failed;

                metric_inc!(BULK_FLUSHES, &["ok"]);
                RECORDS_INDEXED.inc_by(accepted as f64);
                BULK_ITEM_FAILURES.inc_by(response.failed as f64);
                info!(
                    size,
                    failed = response.failed,
                    total = report.committed,
                    "Bulk indexed"
                );
                Ok(())
            }
            Err(source) => {
                metric_inc!(BULK_FLUSHES, &["error"]);
                error!(size, committed = report.committed, error = %source, "Bulk request failed");
                Err(IndexerError::BulkFailed {
                    committed: report.committed,
                    source,
                })
            }
        }
    }
}
