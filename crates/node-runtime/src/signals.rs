//! SIGINT / SIGTERM handling.

use shared_bus::ShutdownTrigger;
use std::io;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Fire `trigger` on the first SIGINT or SIGTERM.
pub fn spawn_signal_handler(trigger: Arc<ShutdownTrigger>) -> JoinHandle<()> {
    tokio::spawn(async move {
        match wait_for_signal().await {
            Ok(name) => info!(signal = name, "Shutdown requested"),
            Err(e) => error!(error = %e, "Cannot listen for signals, shutting down"),
        }
        trigger.fire();
    })
}

#[cfg(unix)]
async fn wait_for_signal() -> io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.map(|()| "SIGINT"),
        _ = terminate.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> io::Result<&'static str> {
    tokio::signal::ctrl_c().await.map(|()| "ctrl-c")
}
