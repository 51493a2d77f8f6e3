//! # Shared Store - Document Store Port
//!
//! Storage for committed crash reports. The indexer writes through
//! [`DocumentStore::bulk`]; the live-feed server reads through
//! [`DocumentStore::search`].
//!
//! ## Backends
//!
//! | Backend | Use |
//! |---------|-----|
//! | [`InMemoryDocumentStore`] | tests, single-process runs |
//! | [`ElasticsearchStore`] | production, REST over `reqwest` |
//!
//! Queries are built as an immutable [`SearchQuery`] and translated once,
//! by the backend, into its native form.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod elasticsearch;
pub mod memory;
pub mod query;
pub mod store;

pub use elasticsearch::{ElasticsearchConfig, ElasticsearchStore};
pub use memory::InMemoryDocumentStore;
pub use query::{SearchQuery, SortField};
pub use store::{
    ensure_index, BulkOperation, BulkResponse, DocumentStore, SearchHit, SearchHits, StoreError,
};

/// URL selecting the in-memory backend.
pub const MEMORY_STORE_URL: &str = "memory://";
