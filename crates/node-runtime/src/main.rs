//! `ac-node` entry point.

use anyhow::{Context, Result};
use clap::Parser;
use crash_telemetry::{init_telemetry, TelemetryConfig};
use node_runtime::signals::spawn_signal_handler;
use node_runtime::{Cli, Container, NodeConfig, NodeRuntime, Role};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let role = Role::from(cli.command);

    let telemetry = TelemetryConfig::for_role(role.name()).with_debug(cli.debug);
    init_telemetry(&telemetry).context("Failed to initialize telemetry")?;

    let config = NodeConfig::load(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    info!(
        role = role.name(),
        config = %cli.config.display(),
        version = env!("CARGO_PKG_VERSION"),
        "Starting ac-node"
    );

    let container = Container::connect(config)
        .await
        .context("Failed to connect backends")?;
    let runtime = NodeRuntime::new(container);
    let signals = spawn_signal_handler(runtime.shutdown_trigger());

    let result = runtime
        .run(role, None)
        .await
        .with_context(|| format!("{} failed", role.name()));
    signals.abort();
    result?;

    info!("Shutdown complete");
    Ok(())
}
