//! # Air-Crash Node Runtime
//!
//! Library half of the `ac-node` binary.
//!
//! ## Modules
//!
//! - `config` - TOML file plus environment overrides
//! - `container` - bus / store connections and readiness
//! - `wiring` - builds and runs one role
//! - `http` - probes, version, metrics, graceful shutdown
//! - `signals` - SIGINT / SIGTERM to the shutdown trigger
//! - `cli` - command line
//!
//! ## Startup Sequence
//!
//! 1. Parse the command line, install logging, register metrics
//! 2. Load and validate configuration
//! 3. Connect bus and store (failure exits)
//! 4. Wire the role, mark ready
//! 5. Run until a signal or a fatal error fires the shutdown trigger

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod cli;
pub mod config;
pub mod container;
pub mod errors;
pub mod http;
pub mod signals;
pub mod wiring;

pub use cli::{Cli, Command};
pub use config::{ConfigError, NodeConfig};
pub use container::Container;
pub use errors::RuntimeError;
pub use wiring::{NodeRuntime, Role};
