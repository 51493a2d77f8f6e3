//! # NATS Bus
//!
//! [`MessageBus`] over a NATS connection. Each subscription is pumped by its
//! own task that invokes the handler; unsubscribing stops that task and waits
//! for it, so no handler runs after `unsubscribe` returns.

use crate::bus::{BusError, MessageBus, MessageHandler, Subscription, SubscriptionTarget};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// NATS-backed bus.
pub struct NatsBus {
    client: async_nats::Client,
}

impl NatsBus {
    /// Connect to the server at `address` (e.g. `nats://127.0.0.1:4222`).
    ///
    /// # Errors
    ///
    /// [`BusError::Connection`] when the server is unreachable.
    pub async fn connect(address: &str) -> Result<Self, BusError> {
        let client = async_nats::connect(address)
            .await
            .map_err(|e| BusError::Connection(e.to_string()))?;
        info!(address = %address, "Connected to NATS");
        Ok(Self { client })
    }
}

#[async_trait]
impl MessageBus for NatsBus {
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), BusError> {
        self.client
            .publish(topic.to_string(), payload)
            .await
            .map_err(|e| BusError::Publish {
                topic: topic.to_string(),
                reason: e.to_string(),
            })
    }

    async fn flush(&self) -> Result<(), BusError> {
        self.client
            .flush()
            .await
            .map_err(|e| BusError::Flush(e.to_string()))
    }

    async fn subscribe(
        &self,
        target: &SubscriptionTarget,
        handler: MessageHandler,
    ) -> Result<Box<dyn Subscription>, BusError> {
        let subscribed = match &target.queue_group {
            Some(group) => {
                self.client
                    .queue_subscribe(target.topic.clone(), group.clone())
                    .await
            }
            None => self.client.subscribe(target.topic.clone()).await,
        };
        let mut subscriber = subscribed.map_err(|e| BusError::Subscribe {
            topic: target.topic.clone(),
            reason: e.to_string(),
        })?;

        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let topic = target.topic.clone();
        let pump = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = &mut stop_rx => break,
                    message = subscriber.next() => match message {
                        Some(message) => handler(message.payload),
                        None => {
                            warn!(topic = %topic, "NATS subscription closed by server");
                            return;
                        }
                    },
                }
            }
            if let Err(e) = subscriber.unsubscribe().await {
                debug!(topic = %topic, error = %e, "NATS unsubscribe failed");
            }
        });

        Ok(Box::new(NatsSubscription {
            stop: Some(stop_tx),
            pump: Some(pump),
        }))
    }
}

struct NatsSubscription {
    stop: Option<oneshot::Sender<()>>,
    pump: Option<JoinHandle<()>>,
}

#[async_trait]
impl Subscription for NatsSubscription {
    async fn unsubscribe(&mut self) -> Result<(), BusError> {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        match self.pump.take() {
            Some(pump) => pump
                .await
                .map_err(|e| BusError::Unsubscribe(e.to_string())),
            None => Ok(()),
        }
    }

    async fn terminated(&mut self) {
        match self.pump.as_mut() {
            Some(pump) => {
                let _ = pump.await;
                self.pump = None;
            }
            None => std::future::pending::<()>().await,
        }
    }
}

impl Drop for NatsSubscription {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}
