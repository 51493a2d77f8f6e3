//! Ports for the indexer.

pub mod outbound;

pub use outbound::{GeocodeError, Geocoder};
