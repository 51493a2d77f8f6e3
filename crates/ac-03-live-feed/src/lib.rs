//! # AC-03 Live Feed
//!
//! Pushes enriched crash records to WebSocket listeners as they are indexed
//! and serves the search API.
//!
//! ```text
//!   bus (flights.enriched)
//!          │  plain subscription
//!          ▼
//!      LiveFeed ──broadcast──► Hub ──try_send──► [buffer] ──► writer pump ──► WebSocket
//!                               ▲                                   │
//!                               └──────── unregister on failure ────┘
//!
//!   GET /api/flights ──► FlightSearch ──► DocumentStore
//! ```
//!
//! ## Slow listeners
//!
//! | Situation | Outcome |
//! |-----------|---------|
//! | Buffer full at broadcast | Listener evicted, buffer closed, close frame sent |
//! | Write fails or times out | Pump unregisters the listener |
//! | Client closes the socket | Reader unregisters the listener |
//! | Shutdown | Every buffer closed, hub exits |

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod errors;
pub mod feed;
pub mod hub;
pub mod ports;
pub mod pump;
pub mod routes;
pub mod search;
pub mod ws;

pub use errors::FeedError;
pub use feed::LiveFeed;
pub use hub::{Hub, HubHandle, ListenerConnection, ListenerId, Outbound, DEFAULT_LISTENER_BUFFER};
pub use ports::ListenerTransport;
pub use pump::{write_pump, PumpConfig, PumpExit, DEFAULT_PING_INTERVAL};
pub use routes::{router, FeedState, SEARCH_PATH, WS_PATH};
pub use search::{parse_timestamp, FlightSearch, SearchParams, SearchResponse, DEFAULT_PAGE_SIZE};
pub use ws::{serve_listener, WebSocketTransport};
