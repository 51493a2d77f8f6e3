//! # Store Port
//!
//! The outbound interface to the document store and its value types.

use crate::query::SearchQuery;
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

/// Errors from document store operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Store unreachable or request could not be sent.
    #[error("Store connection failed: {0}")]
    Connection(String),

    /// `create_index` lost a race or the index was already there.
    #[error("Index '{0}' already exists")]
    IndexAlreadyExists(String),

    /// The index queried does not exist.
    #[error("Index '{0}' not found")]
    IndexNotFound(String),

    /// The store answered with an unexpected status.
    #[error("Unexpected store response ({status}): {body}")]
    Response { status: u16, body: String },

    /// A request or response body could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// One "index this document" instruction within a bulk request.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkOperation {
    pub index: String,
    pub id: String,
    pub document: Value,
}

impl BulkOperation {
    pub fn index(index: impl Into<String>, id: impl Into<String>, document: Value) -> Self {
        Self {
            index: index.into(),
            id: id.into(),
            document,
        }
    }
}

/// Outcome of a bulk request the store accepted.
///
/// Individual items may still have failed; those are reported here rather
/// than as an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkResponse {
    pub succeeded: usize,
    pub failed: usize,
}

/// One search result.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: String,
    pub score: Option<f64>,
    pub source: Value,
}

/// A page of search results plus the total number of matches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchHits {
    pub total: u64,
    pub hits: Vec<SearchHit>,
}

/// Document store consumed by the indexer and the search API.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn index_exists(&self, index: &str) -> Result<bool, StoreError>;

    /// Create an index. Fails with [`StoreError::IndexAlreadyExists`] if it
    /// is already present.
    async fn create_index(&self, index: &str) -> Result<(), StoreError>;

    /// Execute a batch of operations in one round trip.
    async fn bulk(&self, operations: Vec<BulkOperation>) -> Result<BulkResponse, StoreError>;

    async fn search(&self, index: &str, query: &SearchQuery) -> Result<SearchHits, StoreError>;
}

/// Make sure `index` exists, creating it if needed.
///
/// Safe to call repeatedly and from concurrent processes: an
/// "already exists" answer from `create_index` counts as success.
pub async fn ensure_index(store: &dyn DocumentStore, index: &str) -> Result<(), StoreError> {
    if store.index_exists(index).await? {
        debug!(index = %index, "Index already present");
        return Ok(());
    }
    match store.create_index(index).await {
        Ok(()) => {
            info!(index = %index, "Index created");
            Ok(())
        }
        Err(StoreError::IndexAlreadyExists(_)) => {
            debug!(index = %index, "Index created concurrently");
            Ok(())
        }
        Err(e) => Err(e),
    }
}
