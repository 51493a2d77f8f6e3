//! Outbound port for delivering records to one listener.

use crate::errors::FeedError;
use async_trait::async_trait;

/// One-way, frame-oriented delivery to a single listener.
///
/// The writer pump is the only caller; implementations need not be shared.
#[async_trait]
pub trait ListenerTransport: Send {
    /// Deliver one serialized record.
    async fn send_text(&mut self, payload: String) -> Result<(), FeedError>;

    /// Liveness probe.
    async fn ping(&mut self) -> Result<(), FeedError>;

    /// Tell the listener no more records will follow.
    async fn close(&mut self) -> Result<(), FeedError>;
}
