//! # Air-Crash Feed Test Suite
//!
//! Cross-crate flows over the in-memory bus and store.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── fixtures.rs          # CSV samples, records, wait helpers
//! └── integration/
//!     ├── pipeline.rs      # ingress → indexer → store / enriched topic
//!     └── live_feed.rs     # indexer → live feed → WebSocket + search API
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p ac-tests
//! cargo test -p ac-tests integration::live_feed::
//!
//! # Benchmarks
//! cargo bench -p ac-tests
//! ```

pub mod fixtures;
pub mod integration;
