//! Domain layer: enrichment and bulk commit logic.

pub mod accumulator;
pub mod enrichment;
pub mod errors;

pub use accumulator::{BulkCommitter, CommitConfig, CommitReport};
pub use enrichment::{Enricher, EnrichmentOutcome, EnrichmentStats};
pub use errors::IndexerError;
