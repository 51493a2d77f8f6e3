//! # AC-01 Ingress
//!
//! Replays the historical air-crash CSV onto the bus.
//!
//! ```text
//!   crashes.csv ──► source::read_path ──► Vec<FlightCrash> ──► Pump ──(rps)──► bus: flights
//!                         │
//!                         └─ bad rows: warn + ac_ingress_rows_skipped_total
//! ```
//!
//! Rows that do not parse are skipped rather than aborting the run; the
//! count is reported in [`PumpReport::skipped`].

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod errors;
pub mod pump;
pub mod source;

pub use errors::{IngressError, RowError};
pub use pump::{Pump, PumpReport, DEFAULT_RPS};
pub use source::{parse_aboard, parse_row, read_crashes, read_path, CrashFile, COLUMNS};
