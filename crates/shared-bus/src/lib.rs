//! # Shared Bus - Publish/Subscribe Plumbing
//!
//! Every subsystem talks to every other subsystem through a topic-based
//! message bus. This crate provides the bus abstraction, its backends and the
//! adapter that turns a push-style subscription into a pull-style stream.
//!
//! ## Components
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`bus`] | `MessageBus` / `Subscription` ports and `BusError` |
//! | [`memory`] | In-process bus with queue-group load balancing |
//! | `nats` | NATS backend (feature `nats`) |
//! | [`stream`] | Cancelable stream adapter over a subscription |
//! | [`shutdown`] | One-shot, process-wide cancellation signal |
//!
//! ## Stream Adapter
//!
//! ```text
//!  bus callback ──► [ guard: Mutex<Option<Sender>> ] ──► relay ──► consumer
//!                            ▲
//!  shutdown ──► unsubscribe ─┴─► take() sender (close)
//! ```
//!
//! The callback and the cancellation handler share one guard, and the
//! cancellation handler unsubscribes before it takes the guard. Nothing is
//! ever written to a closed relay.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod bus;
pub mod memory;
#[cfg(feature = "nats")]
pub mod nats;
pub mod shutdown;
pub mod stream;

// Re-export main types
pub use bus::{BusError, MessageBus, MessageHandler, Subscription, SubscriptionTarget};
pub use memory::InMemoryBus;
#[cfg(feature = "nats")]
pub use nats::NatsBus;
pub use shutdown::{shutdown_channel, ShutdownSignal, ShutdownTrigger};
pub use stream::{open, CancelableStream, StreamStats};

/// Address scheme selecting the in-process bus.
pub const MEMORY_BUS_ADDRESS: &str = "memory://";
