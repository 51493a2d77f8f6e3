//! # Integration Flows
//!
//! Each test wires real crates together over `InMemoryBus` and
//! `InMemoryDocumentStore`; only the geocoder is a table.

pub mod live_feed;
pub mod pipeline;
