//! Error types for the indexer.

use shared_bus::BusError;
use shared_store::StoreError;
use thiserror::Error;

/// Errors that end an indexer run.
#[derive(Debug, Error)]
pub enum IndexerError {
    /// Could not subscribe to the input topic.
    #[error("Bus error: {0}")]
    Bus(#[from] BusError),

    /// The target index could not be checked or created.
    #[error("Failed to ensure index: {0}")]
    IndexInit(StoreError),

    /// A bulk request failed. Batches before it remain committed.
    #[error("Bulk commit failed after {committed} committed records: {source}")]
    BulkFailed {
        committed: usize,
        #[source]
        source: StoreError,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
