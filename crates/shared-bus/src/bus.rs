//! # Bus Ports
//!
//! The narrow interface every bus backend implements.

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;

/// Callback invoked once per delivered message.
///
/// Handlers run on the delivering backend's task and must not block or call
/// back into the bus.
pub type MessageHandler = Arc<dyn Fn(Bytes) + Send + Sync>;

/// Errors from bus operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    /// Could not reach the bus at startup.
    #[error("Bus connection failed: {0}")]
    Connection(String),

    /// A publish was rejected or could not be sent.
    #[error("Publish to '{topic}' failed: {reason}")]
    Publish { topic: String, reason: String },

    /// A subscription could not be registered.
    #[error("Subscribe to '{topic}' failed: {reason}")]
    Subscribe { topic: String, reason: String },

    /// The backend failed to tear a subscription down.
    #[error("Unsubscribe failed: {0}")]
    Unsubscribe(String),

    /// Buffered publishes could not be written out.
    #[error("Flush failed: {0}")]
    Flush(String),

    /// The bus has been shut down.
    #[error("Bus closed")]
    Closed,
}

/// What to subscribe to: a topic, optionally shared through a queue group.
///
/// Members of the same queue group split the messages of a topic between
/// them, each message going to exactly one member. Subscriptions without a
/// group see every message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionTarget {
    pub topic: String,
    pub queue_group: Option<String>,
}

impl SubscriptionTarget {
    /// Plain broadcast subscription.
    pub fn topic(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            queue_group: None,
        }
    }

    /// Load-balanced subscription within `group`.
    pub fn queue(topic: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            queue_group: Some(group.into()),
        }
    }
}

/// A topic-based publish/subscribe bus.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publish a payload to a topic. Having no subscribers is not an error.
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), BusError>;

    /// Wait until every publish made so far has left the process.
    ///
    /// Backends that deliver inside `publish` have nothing to do.
    async fn flush(&self) -> Result<(), BusError> {
        Ok(())
    }

    /// Register `handler` for messages matching `target`.
    async fn subscribe(
        &self,
        target: &SubscriptionTarget,
        handler: MessageHandler,
    ) -> Result<Box<dyn Subscription>, BusError>;
}

/// A live registration returned by [`MessageBus::subscribe`].
#[async_trait]
pub trait Subscription: Send {
    /// Stop delivery.
    ///
    /// Idempotent. Once this returns, no invocation of the handler for this
    /// subscription is running or will start.
    async fn unsubscribe(&mut self) -> Result<(), BusError>;

    /// Resolves when the backend ends the subscription on its own (connection
    /// loss). Backends that never do so keep the default, which never
    /// resolves.
    async fn terminated(&mut self) {
        std::future::pending::<()>().await;
    }
}
