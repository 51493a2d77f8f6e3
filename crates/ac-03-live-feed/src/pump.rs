//! Writer pump: drains one listener's outbound buffer into its transport.
//!
//! Sends a ping every `ping_interval`. When the hub closes the buffer the
//! pump sends a close frame and exits; when a write fails or times out the
//! pump unregisters the listener itself.

use crate::errors::FeedError;
use crate::hub::{HubHandle, ListenerId, Outbound};
use crate::ports::ListenerTransport;
use std::future::Future;
use std::time::Duration;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tracing::{debug, warn};

pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(54);
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PumpConfig {
    pub ping_interval: Duration,
    /// Upper bound on a single frame write.
    pub write_timeout: Duration,
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            ping_interval: DEFAULT_PING_INTERVAL,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }
}

/// Why a pump stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpExit {
    /// The hub closed the buffer; a close frame was attempted.
    Closed,
    /// A write failed; the listener was unregistered.
    TransportFailed,
}

pub async fn write_pump<T: ListenerTransport>(
    id: ListenerId,
    mut transport: T,
    mut outbound: Outbound,
    hub: HubHandle,
    config: PumpConfig,
) -> PumpExit {
    let mut ticker = interval_at(Instant::now() + config.ping_interval, config.ping_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let written = tokio::select! {
            record = outbound.recv() => match record {
                Some(record) => match serde_json::to_string(record.as_ref()) {
                    Ok(payload) => bounded(config.write_timeout, transport.send_text(payload)).await,
                    Err(e) => {
                        warn!(listener = %id, error = %e, "Record could not be encoded, skipped");
                        continue;
                    }
                },
                None => {
                    if let Err(e) = bounded(config.write_timeout, transport.close()).await {
                        debug!(listener = %id, error = %e, "Close frame not delivered");
                    }
                    debug!(listener = %id, "Listener buffer closed, pump stopped");
                    return PumpExit::Closed;
                }
            },
            _ = ticker.tick() => bounded(config.write_timeout, transport.ping()).await,
        };

        if let Err(e) = written {
            warn!(listener = %id, error = %e, "Write to listener failed, unregistering");
            hub.unregister(id);
            return PumpExit::TransportFailed;
        }
    }
}

async fn bounded<F>(limit: Duration, write: F) -> Result<(), FeedError>
where
    F: Future<Output = Result<(), FeedError>>,
{
    timeout(limit, write)
        .await
        .unwrap_or_else(|_| Err(FeedError::Transport("write timed out".into())))
}
