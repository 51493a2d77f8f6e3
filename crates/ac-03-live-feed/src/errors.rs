use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use shared_bus::BusError;
use shared_store::StoreError;
use thiserror::Error;

/// Errors surfaced by the live feed.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("bus error: {0}")]
    Bus(#[from] BusError),

    #[error("search failed: {0}")]
    Search(#[from] StoreError),

    /// The hub event loop has exited.
    #[error("hub is not running")]
    HubClosed,

    #[error("listener transport failed: {0}")]
    Transport(String),
}

impl FeedError {
    pub fn status(&self) -> StatusCode {
        match self {
            FeedError::Search(StoreError::IndexNotFound(_)) => StatusCode::NOT_FOUND,
            FeedError::Search(StoreError::Connection(_)) | FeedError::HubClosed => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for FeedError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}
