//! # In-Memory Bus
//!
//! Single-process bus used for tests and the all-local deployment.
//!
//! Delivery happens synchronously inside `publish`, under a read lock on the
//! registry. `unsubscribe` takes the write lock, so it waits for any delivery
//! in progress and no handler can start afterwards.

use crate::bus::{BusError, MessageBus, MessageHandler, Subscription, SubscriptionTarget};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

struct Member {
    id: u64,
    handler: MessageHandler,
}

#[derive(Default)]
struct QueueGroup {
    members: Vec<Member>,
    cursor: AtomicUsize,
}

#[derive(Default)]
struct TopicEntry {
    plain: Vec<Member>,
    groups: HashMap<String, QueueGroup>,
}

impl TopicEntry {
    fn is_empty(&self) -> bool {
        self.plain.is_empty() && self.groups.is_empty()
    }

    fn subscriber_count(&self) -> usize {
        self.plain.len() + self.groups.values().map(|g| g.members.len()).sum::<usize>()
    }
}

type Registry = Arc<RwLock<HashMap<String, TopicEntry>>>;

/// In-process implementation of [`MessageBus`].
pub struct InMemoryBus {
    topics: Registry,
    next_id: AtomicU64,
    messages_published: AtomicU64,
}

impl InMemoryBus {
    #[must_use]
    pub fn new() -> Self {
        Self {
            topics: Arc::new(RwLock::new(HashMap::new())),
            next_id: AtomicU64::new(1),
            messages_published: AtomicU64::new(0),
        }
    }

    /// Number of live subscriptions on a topic, across all queue groups.
    #[must_use]
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .read()
            .get(topic)
            .map_or(0, TopicEntry::subscriber_count)
    }

    /// Total messages published since creation.
    #[must_use]
    pub fn messages_published(&self) -> u64 {
        self.messages_published.load(Ordering::Relaxed)
    }
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageBus for InMemoryBus {
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), BusError> {
        self.messages_published.fetch_add(1, Ordering::Relaxed);

        let topics = self.topics.read();
        let Some(entry) = topics.get(topic) else {
            trace!(topic = %topic, "Message dropped (no subscribers)");
            return Ok(());
        };

        for member in &entry.plain {
            (member.handler)(payload.clone());
        }
        for group in entry.groups.values() {
            if group.members.is_empty() {
                continue;
            }
            let slot = group.cursor.fetch_add(1, Ordering::Relaxed) % group.members.len();
            (group.members[slot].handler)(payload.clone());
        }
        Ok(())
    }

    async fn subscribe(
        &self,
        target: &SubscriptionTarget,
        handler: MessageHandler,
    ) -> Result<Box<dyn Subscription>, BusError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let member = Member { id, handler };

        {
            let mut topics = self.topics.write();
            let entry = topics.entry(target.topic.clone()).or_default();
            match &target.queue_group {
                Some(group) => entry
                    .groups
                    .entry(group.clone())
                    .or_default()
                    .members
                    .push(member),
                None => entry.plain.push(member),
            }
        }

        debug!(
            topic = %target.topic,
            queue_group = ?target.queue_group,
            subscription_id = id,
            "Subscription registered"
        );

        Ok(Box::new(MemorySubscription {
            id,
            target: target.clone(),
            topics: Arc::clone(&self.topics),
            active: true,
        }))
    }
}

/// Handle for an [`InMemoryBus`] registration. Dropping it unsubscribes.
struct MemorySubscription {
    id: u64,
    target: SubscriptionTarget,
    topics: Registry,
    active: bool,
}

impl MemorySubscription {
    fn remove(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;

        let mut topics = self.topics.write();
        let Some(entry) = topics.get_mut(&self.target.topic) else {
            return;
        };
        match &self.target.queue_group {
            Some(group) => {
                if let Some(queue) = entry.groups.get_mut(group) {
                    queue.members.retain(|m| m.id != self.id);
                    if queue.members.is_empty() {
                        entry.groups.remove(group);
                    }
                }
            }
            None => entry.plain.retain(|m| m.id != self.id),
        }
        if entry.is_empty() {
            topics.remove(&self.target.topic);
        }
        debug!(topic = %self.target.topic, subscription_id = self.id, "Subscription removed");
    }
}

#[async_trait]
impl Subscription for MemorySubscription {
    async fn unsubscribe(&mut self) -> Result<(), BusError> {
        self.remove();
        Ok(())
    }
}

impl Drop for MemorySubscription {
    fn drop(&mut self) {
        self.remove();
    }
}
