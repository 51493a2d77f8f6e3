//! # Fan-out Hub
//!
//! One event loop owns the listener set. Register, unregister and broadcast
//! requests arrive on three channels, so the set is never shared.
//!
//! ```text
//!  register ───┐
//!  unregister ─┼──► Hub::run ──try_send──► listener buffer ──► writer pump
//!  broadcast ──┘                      └──► (full | gone) evict + close
//! ```
//!
//! Delivery never blocks: a listener whose buffer is full is evicted on the
//! spot and its buffer closed, so the writer pump sends a close frame and
//! exits. Other listeners are unaffected.

use crate::errors::FeedError;
use crash_telemetry::{metric_inc, FEED_BROADCASTS, FEED_EVICTIONS, FEED_LISTENERS};
use shared_bus::ShutdownSignal;
use shared_types::FlightCrash;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Outbound buffer size per listener.
pub const DEFAULT_LISTENER_BUFFER: usize = 256;

/// Records waiting for the hub loop before `broadcast` suspends.
const BROADCAST_BACKLOG: usize = 1024;

/// Eviction reasons on `ac_feed_listener_evictions_total`.
const EVICTED_SLOW: &str = "slow";
const EVICTED_GONE: &str = "gone";

pub type ListenerId = Uuid;

/// Receiving half of a listener's outbound buffer, drained by its writer pump.
pub type Outbound = mpsc::Receiver<Arc<FlightCrash>>;

/// A listener as the hub sees it: an id and the sending half of its buffer.
#[derive(Debug)]
pub struct ListenerConnection {
    id: ListenerId,
    sender: mpsc::Sender<Arc<FlightCrash>>,
}

impl ListenerConnection {
    /// Create a connection with a buffer of `capacity` records.
    pub fn new(capacity: usize) -> (Self, Outbound) {
        let (sender, outbound) = mpsc::channel(capacity.max(1));
        let connection = Self {
            id: Uuid::new_v4(),
            sender,
        };
        (connection, outbound)
    }

    pub fn id(&self) -> ListenerId {
        self.id
    }
}

/// Cloneable front door to a running [`Hub`].
#[derive(Clone)]
pub struct HubHandle {
    register: mpsc::UnboundedSender<ListenerConnection>,
    unregister: mpsc::UnboundedSender<ListenerId>,
    broadcast: mpsc::Sender<Arc<FlightCrash>>,
    listeners: Arc<AtomicUsize>,
}

impl HubHandle {
    pub fn register(&self, connection: ListenerConnection) -> Result<(), FeedError> {
        self.register
            .send(connection)
            .map_err(|_| FeedError::HubClosed)
    }

    /// Remove a listener. Unknown ids are ignored.
    pub fn unregister(&self, id: ListenerId) {
        // A stopped hub has already closed every buffer.
        let _ = self.unregister.send(id);
    }

    pub async fn broadcast(&self, record: FlightCrash) -> Result<(), FeedError> {
        self.broadcast
            .send(Arc::new(record))
            .await
            .map_err(|_| FeedError::HubClosed)
    }

    /// Listeners currently registered, as of the hub's last step.
    pub fn listener_count(&self) -> usize {
        self.listeners.load(Ordering::Acquire)
    }
}

/// The hub event loop. Create with [`Hub::new`], drive with [`Hub::run`].
pub struct Hub {
    register_rx: mpsc::UnboundedReceiver<ListenerConnection>,
    unregister_rx: mpsc::UnboundedReceiver<ListenerId>,
    broadcast_rx: mpsc::Receiver<Arc<FlightCrash>>,
    listeners: HashMap<ListenerId, mpsc::Sender<Arc<FlightCrash>>>,
    count: Arc<AtomicUsize>,
}

impl Hub {
    pub fn new() -> (Self, HubHandle) {
        let (register, register_rx) = mpsc::unbounded_channel();
        let (unregister, unregister_rx) = mpsc::unbounded_channel();
        let (broadcast, broadcast_rx) = mpsc::channel(BROADCAST_BACKLOG);
        let count = Arc::new(AtomicUsize::new(0));

        let hub = Self {
            register_rx,
            unregister_rx,
            broadcast_rx,
            listeners: HashMap::new(),
            count: Arc::clone(&count),
        };
        let handle = HubHandle {
            register,
            unregister,
            broadcast,
            listeners: count,
        };
        (hub, handle)
    }

    /// Serve requests until `shutdown` fires or every handle is dropped,
    /// then close all listener buffers.
    pub async fn run(mut self, shutdown: ShutdownSignal) {
        info!("Hub started");
        loop {
            // Registrations go first so a listener registered before a
            // broadcast is included in it.
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                Some(connection) = self.register_rx.recv() => self.add(connection),
                Some(id) = self.unregister_rx.recv() => self.remove(id),
                record = self.broadcast_rx.recv() => match record {
                    Some(record) => self.fan_out(record),
                    None => break,
                },
            }
        }
        let closed = self.close_all();
        info!(closed, "Hub stopped");
    }

    fn add(&mut self, connection: ListenerConnection) {
        let id = connection.id;
        if self.listeners.insert(id, connection.sender).is_none() {
            FEED_LISTENERS.inc();
        }
        self.publish_count();
        debug!(listener = %id, listeners = self.listeners.len(), "Listener registered");
    }

    fn remove(&mut self, id: ListenerId) {
        // Dropping the sender closes the buffer.
        if self.listeners.remove(&id).is_some() {
            FEED_LISTENERS.dec();
            self.publish_count();
            debug!(listener = %id, listeners = self.listeners.len(), "Listener unregistered");
        }
    }

    fn fan_out(&mut self, record: Arc<FlightCrash>) {
        metric_inc!(FEED_BROADCASTS);
        let before = self.listeners.len();
        self.listeners
            .retain(|id, sender| match sender.try_send(Arc::clone(&record)) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    warn!(listener = %id, "Listener too slow, evicted");
                    metric_inc!(FEED_EVICTIONS, &[EVICTED_SLOW]);
                    false
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(listener = %id, "Listener gone, evicted");
                    metric_inc!(FEED_EVICTIONS, &[EVICTED_GONE]);
                    false
                }
            });

        let evicted = before - self.listeners.len();
        if evicted > 0 {
            FEED_LISTENERS.sub(evicted as f64);
            self.publish_count();
        }
    }

    fn close_all(&mut self) -> usize {
        let closed = self.listeners.len();
        self.listeners.clear();
        FEED_LISTENERS.sub(closed as f64);
        self.publish_count();
        closed
    }

    fn publish_count(&self) {
        self.count.store(self.listeners.len(), Ordering::Release);
    }
}
