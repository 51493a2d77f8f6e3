//! # Indexer Subsystem
//!
//! **Subsystem ID:** 2
//!
//! ## Purpose
//!
//! Drains the raw crash-report topic, geocodes each report's location,
//! commits the reports to the document store in fixed-size batches and
//! re-publishes geolocated reports on the output topic for the live feed.
//!
//! ## Pipeline
//!
//! ```text
//! bus(topic, queue group) ──► CancelableStream ──► Enricher ──┬──► BulkCommitter ──► DocumentStore
//!                                                             └──► Republisher ──► bus(out_topic)
//! ```
//!
//! ## Delivery Guarantees
//!
//! | Failure | Class | Effect |
//! |---------|-------|--------|
//! | Geocoder error / no match | per-record | record stored without coordinates, counted |
//! | Re-publish failure | per-record | logged and counted, indexing continues |
//! | Bulk request failure | batch-fatal | run aborts, earlier batches stay committed |
//! | Index cannot be ensured | subsystem-fatal | run fails before the first record |
//!
//! Delivery is at-least-once: every record gets a UUID v4 before its first
//! commit, so a replayed batch overwrites rather than duplicates.
//!
//! ## Module Structure (Hexagonal Architecture)
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  adapters/ - Google geocoder, fixed-table geocoder, republisher │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ implements ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  ports/outbound.rs - Geocoder trait                             │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ uses ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  domain/enrichment.rs  - Enricher, EnrichmentOutcome            │
//! │  domain/accumulator.rs - BulkCommitter, CommitReport            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::{FixedGeocoder, GeocoderConfig, GoogleGeocoder, Republisher};
pub use domain::{
    BulkCommitter, CommitConfig, CommitReport, Enricher, EnrichmentOutcome, EnrichmentStats,
    IndexerError,
};
pub use ports::{GeocodeError, Geocoder};
pub use service::{Indexer, IndexerConfig};

/// Default name of the index crash reports are committed to.
pub const DEFAULT_INDEX: &str = "flights";

/// Default number of records per bulk request.
pub const DEFAULT_BULK_SIZE: usize = 100;
