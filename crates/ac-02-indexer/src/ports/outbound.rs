//! Outbound ports (driven side).

use async_trait::async_trait;
use shared_types::Location;
use thiserror::Error;

/// Errors from a geocoding lookup.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GeocodeError {
    /// The request never got an answer.
    #[error("Geocoder transport error: {0}")]
    Transport(String),

    /// The service answered with an error status.
    #[error("Geocoder returned {status}: {message}")]
    Api { status: String, message: String },

    /// The answer could not be decoded.
    #[error("Geocoder response decode error: {0}")]
    Decode(String),

    /// The client could not be constructed.
    #[error("Geocoder configuration error: {0}")]
    Config(String),
}

/// Resolves a free-text address to coordinates.
///
/// An empty result means the address was understood but matched nothing.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, address: &str) -> Result<Vec<Location>, GeocodeError>;
}
