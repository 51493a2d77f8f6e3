//! # Shutdown Signal
//!
//! A one-shot broadcast that every long-running task observes. Once fired it
//! never resets. Dropping the trigger without firing also counts as fired, so
//! tasks never outlive the owner of the trigger.

use tokio::sync::watch;

/// Create a linked trigger/signal pair.
#[must_use]
pub fn shutdown_channel() -> (ShutdownTrigger, ShutdownSignal) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, ShutdownSignal { rx })
}

/// The firing side. Usually owned by the signal handler in `main`.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    /// Fire the signal. Calling it again has no further effect.
    pub fn fire(&self) {
        self.tx.send_replace(true);
    }

    /// Another signal observing this trigger.
    #[must_use]
    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }
}

/// The observing side. Cheap to clone; hand one to every task.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Whether shutdown has been requested.
    #[must_use]
    pub fn is_fired(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Resolve once shutdown has been requested. Cancel-safe.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        // Err means the trigger is gone, which we treat as fired.
        let _ = rx.wait_for(|fired| *fired).await;
    }
}
