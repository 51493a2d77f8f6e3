//! # Shared Types Crate
//!
//! Domain entities shared across the ingress, indexer and live-feed
//! subsystems.
//!
//! ## Design Principles
//!
//! - **Single wire format**: [`FlightCrash`] is the only payload carried on the
//!   bus, encoded as JSON with every empty field omitted.
//! - **Copy-on-enrich**: stages never mutate a record another stage may hold;
//!   enrichment produces a new value.
//! - **Owned readiness**: health state is an explicit [`Readiness`] handle, not
//!   a process global.

pub mod entities;
pub mod readiness;

pub use entities::{Aboard, FlightCrash, Location};
pub use readiness::Readiness;
