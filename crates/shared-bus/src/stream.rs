//! # Cancelable Stream Adapter
//!
//! Converts a push-style bus subscription into a pull-style [`Stream`] of
//! decoded records that ends cleanly when the shutdown signal fires.
//!
//! ## Close protocol
//!
//! The bus callback and the cancellation path both go through [`Relay`],
//! whose mutex guards the sender half of an unbounded channel:
//!
//! 1. the callback locks, writes if the sender is present, unlocks;
//! 2. on cancellation the watcher first unsubscribes from the bus, then
//!    locks and takes the sender, closing the channel.
//!
//! A callback that was already in flight either finishes its write before
//! the close or finds the sender gone and drops the record. The consumer sees
//! every accepted record followed by end-of-stream.
//!
//! The channel never pushes back on the bus: while the consumer is slower
//! than delivery (a stalled geocoder, say) the queue keeps growing.

use crate::bus::{BusError, MessageBus, MessageHandler, SubscriptionTarget};
use crate::shutdown::ShutdownSignal;
use bytes::Bytes;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_stream::Stream;
use tracing::{debug, info, warn};

/// Counters for one adapter instance.
#[derive(Debug, Default)]
pub struct StreamStats {
    delivered: AtomicU64,
    malformed: AtomicU64,
    dropped_after_close: AtomicU64,
}

impl StreamStats {
    /// Records handed to the consumer's channel.
    #[must_use]
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Messages that failed to decode and were discarded.
    #[must_use]
    pub fn malformed(&self) -> u64 {
        self.malformed.load(Ordering::Relaxed)
    }

    /// Records that arrived after the relay was closed (or the consumer
    /// went away) and were discarded instead of written.
    #[must_use]
    pub fn dropped_after_close(&self) -> u64 {
        self.dropped_after_close.load(Ordering::Relaxed)
    }
}

/// The guarded write side of the relay channel.
struct Relay<T> {
    sender: Mutex<Option<mpsc::UnboundedSender<T>>>,
    stats: Arc<StreamStats>,
}

impl<T> Relay<T> {
    fn new(sender: mpsc::UnboundedSender<T>, stats: Arc<StreamStats>) -> Self {
        Self {
            sender: Mutex::new(Some(sender)),
            stats,
        }
    }

    /// Write a record unless the relay is closed. Returns whether it was
    /// accepted.
    fn send(&self, record: T) -> bool {
        let guard = self.sender.lock();
        let accepted = match guard.as_ref() {
            Some(tx) => tx.send(record).is_ok(),
            None => false,
        };
        if accepted {
            self.stats.delivered.fetch_add(1, Ordering::Relaxed);
        } else {
            self.stats.dropped_after_close.fetch_add(1, Ordering::Relaxed);
        }
        accepted
    }

    /// Close the relay. Returns false if it was already closed.
    fn close(&self) -> bool {
        self.sender.lock().take().is_some()
    }
}

/// A finite stream of records from one bus subscription.
///
/// Ends when the shutdown signal fires, when the bus ends the subscription,
/// or never otherwise. Dropping the stream unsubscribes.
pub struct CancelableStream<T> {
    receiver: mpsc::UnboundedReceiver<T>,
    stats: Arc<StreamStats>,
    topic: String,
}

impl<T> CancelableStream<T> {
    /// Receive the next record; `None` once the stream has been closed and
    /// drained.
    pub async fn recv(&mut self) -> Option<T> {
        self.receiver.recv().await
    }

    /// Shared counters for this adapter.
    #[must_use]
    pub fn stats(&self) -> Arc<StreamStats> {
        Arc::clone(&self.stats)
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl<T> Stream for CancelableStream<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

/// Subscribe to `target` and expose the decoded messages as a stream.
///
/// Messages that do not decode as `T` are logged, counted and skipped. The
/// subscription is torn down when `shutdown` fires or the returned stream is
/// dropped.
///
/// # Errors
///
/// Returns the bus error if the subscription cannot be registered.
pub async fn open<T>(
    bus: &dyn MessageBus,
    target: SubscriptionTarget,
    shutdown: ShutdownSignal,
) -> Result<CancelableStream<T>, BusError>
where
    T: DeserializeOwned + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let stats = Arc::new(StreamStats::default());
    let consumer_gone = tx.clone();
    let relay = Arc::new(Relay::new(tx, Arc::clone(&stats)));

    let handler: MessageHandler = {
        let relay = Arc::clone(&relay);
        let topic = target.topic.clone();
        Arc::new(move |payload: Bytes| match serde_json::from_slice::<T>(&payload) {
            Ok(record) => {
                if !relay.send(record) {
                    debug!(topic = %topic, "Record arrived after stream close, dropped");
                }
            }
            Err(e) => {
                relay.stats.malformed.fetch_add(1, Ordering::Relaxed);
                warn!(topic = %topic, error = %e, bytes = payload.len(), "Malformed message dropped");
            }
        })
    };

    let mut subscription = bus.subscribe(&target, handler).await?;
    info!(topic = %target.topic, queue_group = ?target.queue_group, "Stream opened");

    let topic = target.topic.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = shutdown.cancelled() => info!(topic = %topic, "Work cancelled, closing stream"),
            _ = consumer_gone.closed() => debug!(topic = %topic, "Stream consumer dropped"),
            _ = subscription.terminated() => warn!(topic = %topic, "Bus ended the subscription"),
        }
        drop(consumer_gone);

        // Unsubscribe before taking the guard: no callback starts after this.
        if let Err(e) = subscription.unsubscribe().await {
            warn!(topic = %topic, error = %e, "Unsubscribe failed");
        }
        if relay.close() {
            debug!(topic = %topic, "Relay closed");
        }
    });

    Ok(CancelableStream {
        receiver: rx,
        stats,
        topic: target.topic,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryBus;
    use crate::shutdown::shutdown_channel;
    use proptest::prelude::*;
    use serde::Deserialize;
    use std::time::Duration;
    use tokio::time::timeout;
    use tokio_stream::StreamExt;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Ping {
        seq: u64,
    }

    fn ping(seq: u64) -> Bytes {
        Bytes::from(format!(r#"{{"seq":{seq}}}"#))
    }

    async fn wait_for_unsubscribe(bus: &InMemoryBus, topic: &str) {
        timeout(Duration::from_secs(1), async {
            while bus.subscriber_count(topic) > 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("subscription still registered");
    }

    #[tokio::test]
    async fn test_records_arrive_in_order() {
        let bus = InMemoryBus::new();
        let (_trigger, signal) = shutdown_channel();
        let mut stream = open::<Ping>(&bus, SubscriptionTarget::topic("t"), signal)
            .await
            .unwrap();

        for seq in 0..5 {
            bus.publish("t", ping(seq)).await.unwrap();
        }

        for seq in 0..5 {
            let got = timeout(Duration::from_millis(100), stream.recv())
                .await
                .expect("timeout")
                .expect("record");
            assert_eq!(got, Ping { seq });
        }
        assert_eq!(stream.stats().delivered(), 5);
    }

    #[tokio::test]
    async fn test_malformed_message_does_not_end_stream() {
        let bus = InMemoryBus::new();
        let (_trigger, signal) = shutdown_channel();
        let mut stream = open::<Ping>(&bus, SubscriptionTarget::topic("t"), signal)
            .await
            .unwrap();

        bus.publish("t", Bytes::from_static(b"{broken")).await.unwrap();
        bus.publish("t", ping(7)).await.unwrap();

        let got = timeout(Duration::from_millis(100), stream.recv())
            .await
            .expect("timeout");
        assert_eq!(got, Some(Ping { seq: 7 }));
        assert_eq!(stream.stats().malformed(), 1);
    }

    #[tokio::test]
    async fn test_cancel_drains_then_ends() {
        let bus = InMemoryBus::new();
        let (trigger, signal) = shutdown_channel();
        let stream = open::<Ping>(&bus, SubscriptionTarget::topic("t"), signal)
            .await
            .unwrap();

        bus.publish("t", ping(1)).await.unwrap();
        bus.publish("t", ping(2)).await.unwrap();
        trigger.fire();

        let all: Vec<Ping> = timeout(Duration::from_secs(1), stream.collect())
            .await
            .expect("stream did not end");
        assert_eq!(all, vec![Ping { seq: 1 }, Ping { seq: 2 }]);
        assert_eq!(bus.subscriber_count("t"), 0);
    }

    #[tokio::test]
    async fn test_dropping_stream_unsubscribes() {
        let bus = InMemoryBus::new();
        let (_trigger, signal) = shutdown_channel();
        let stream = open::<Ping>(&bus, SubscriptionTarget::topic("t"), signal)
            .await
            .unwrap();
        assert_eq!(bus.subscriber_count("t"), 1);

        drop(stream);
        wait_for_unsubscribe(&bus, "t").await;
    }

    #[tokio::test]
    async fn test_queue_group_splits_between_streams() {
        let bus = InMemoryBus::new();
        let (trigger, signal) = shutdown_channel();
        let target = SubscriptionTarget::queue("t", "workers");
        let a = open::<Ping>(&bus, target.clone(), signal.clone()).await.unwrap();
        let b = open::<Ping>(&bus, target, signal).await.unwrap();

        for seq in 0..6 {
            bus.publish("t", ping(seq)).await.unwrap();
        }
        trigger.fire();

        let a: Vec<Ping> = a.collect().await;
        let b: Vec<Ping> = b.collect().await;
        assert_eq!(a.len() + b.len(), 6);
        assert_eq!(a.len(), 3);
    }

    #[test]
    fn test_relay_rejects_after_close() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let stats = Arc::new(StreamStats::default());
        let relay = Relay::new(tx, Arc::clone(&stats));

        assert!(relay.send(1));
        assert!(relay.close());
        assert!(!relay.close());
        assert!(!relay.send(2));

        assert_eq!(rx.try_recv().unwrap(), 1);
        assert!(rx.try_recv().is_err());
        assert_eq!(stats.delivered(), 1);
        assert_eq!(stats.dropped_after_close(), 1);
    }

    #[test]
    fn test_relay_concurrent_close_loses_nothing_accepted() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let stats = Arc::new(StreamStats::default());
        let relay = Arc::new(Relay::new(tx, Arc::clone(&stats)));

        let writers: Vec<_> = (0..4)
            .map(|w| {
                let relay = Arc::clone(&relay);
                std::thread::spawn(move || {
                    (0..500u64).filter(|i| relay.send(w * 1000 + i)).count()
                })
            })
            .collect();
        std::thread::sleep(Duration::from_millis(1));
        relay.close();

        let accepted: usize = writers.into_iter().map(|h| h.join().unwrap()).sum();
        let mut received = 0;
        while rx.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, accepted);
        assert_eq!(stats.delivered() + stats.dropped_after_close(), 2000);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        /// Whatever the interleaving of deliveries and cancellation, the
        /// relay is never written after close and nothing accepted is lost.
        #[test]
        fn prop_no_send_after_close(
            total in 1u64..300,
            cancel_after in 0usize..64,
            yield_every in 1u64..16,
        ) {
            let rt = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(4)
                .enable_all()
                .build()
                .unwrap();

            let (received, stats) = rt.block_on(async move {
                let bus = Arc::new(InMemoryBus::new());
                let (trigger, signal) = shutdown_channel();
                let mut stream = open::<Ping>(bus.as_ref(), SubscriptionTarget::topic("t"), signal)
                    .await
                    .unwrap();
                let stats = stream.stats();

                let publisher = {
                    let bus = Arc::clone(&bus);
                    tokio::spawn(async move {
                        for seq in 0..total {
                            bus.publish("t", ping(seq)).await.unwrap();
                            if seq % yield_every == 0 {
                                tokio::task::yield_now().await;
                            }
                        }
                    })
                };
                let canceller = tokio::spawn(async move {
                    for _ in 0..cancel_after {
                        tokio::task::yield_now().await;
                    }
                    trigger.fire();
                    trigger
                });

                let mut received = Vec::new();
                while let Some(ping) = stream.recv().await {
                    received.push(ping.seq);
                }
                publisher.await.unwrap();
                let _trigger = canceller.await.unwrap();
                (received, stats)
            });

            prop_assert_eq!(stats.dropped_after_close(), 0);
            prop_assert_eq!(received.len() as u64, stats.delivered());
            prop_assert!(received.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
