//! Adapters connecting the indexer to external systems.

pub mod fixed;
pub mod google;
pub mod republisher;

pub use fixed::FixedGeocoder;
pub use google::{GeocoderConfig, GoogleGeocoder};
pub use republisher::Republisher;

/// Topics used by the indexer.
pub mod topics {
    /// Raw crash reports published by the ingress pump.
    pub const FLIGHTS: &str = "flights";
    /// Enriched crash reports consumed by the live feed.
    pub const FLIGHTS_ENRICHED: &str = "flights.enriched";
    /// Queue group shared by indexer replicas.
    pub const INDEXER_QUEUE_GROUP: &str = "indexers";
}
