//! # Readiness
//!
//! Liveness and readiness flags for a running process. One instance is
//! created at startup, shared by `Arc`, and flipped during shutdown so load
//! balancers stop routing traffic before the listener closes.

use std::sync::atomic::{AtomicBool, Ordering};

/// Health and readiness state owned by the runtime.
#[derive(Debug)]
pub struct Readiness {
    healthy: AtomicBool,
    ready: AtomicBool,
}

impl Readiness {
    /// A process that is alive but not yet serving.
    #[must_use]
    pub fn new() -> Self {
        Self {
            healthy: AtomicBool::new(true),
            ready: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Mark the process as able to take traffic.
    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }

    /// Report both probes as failing. Used at the start of shutdown.
    pub fn mark_unavailable(&self) {
        self.healthy.store(false, Ordering::Release);
        self.ready.store(false, Ordering::Release);
    }
}

impl Default for Readiness {
    fn default() -> Self {
        Self::new()
    }
}
