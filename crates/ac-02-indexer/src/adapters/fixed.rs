//! Table-driven geocoder.
//!
//! Answers from an in-memory table. Used when no API key is configured (every
//! lookup then misses) and as a deterministic stand-in in tests.

use crate::ports::{GeocodeError, Geocoder};
use async_trait::async_trait;
use shared_types::Location;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct FixedGeocoder {
    table: HashMap<String, Vec<Location>>,
    failing: HashSet<String>,
    calls: AtomicUsize,
}

impl FixedGeocoder {
    /// A geocoder that knows no addresses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `address` with `results`.
    #[must_use]
    pub fn with(mut self, address: &str, results: Vec<Location>) -> Self {
        self.table.insert(address.to_string(), results);
        self
    }

    /// Fail every lookup of `address`.
    #[must_use]
    pub fn failing(mut self, address: &str) -> Self {
        self.failing.insert(address.to_string());
        self
    }

    /// Lookups served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Geocoder for FixedGeocoder {
    async fn geocode(&self, address: &str) -> Result<Vec<Location>, GeocodeError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if self.failing.contains(address) {
            return Err(GeocodeError::Transport(format!("lookup of '{address}' refused")));
        }
        Ok(self.table.get(address).cloned().unwrap_or_default())
    }
}
