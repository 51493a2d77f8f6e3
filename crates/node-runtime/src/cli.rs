use crate::config::DEFAULT_CONFIG_PATH;
use crate::wiring::Role;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Air-crash pipeline node.
#[derive(Parser, Debug)]
#[command(name = "ac-node", version)]
#[command(about = "Replays, enriches, indexes and streams air-crash records")]
pub struct Cli {
    /// TOML configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Debug-level logging
    #[arg(long)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Replay the CSV onto the bus
    Ingress {
        /// Records per second, overrides `ingress.rps`
        #[arg(long)]
        rps: Option<u32>,
    },
    /// Enrich, index and re-publish records
    Indexer,
    /// Live feed and search API
    Server,
    /// Every role in one process
    All {
        #[arg(long)]
        rps: Option<u32>,
    },
}

impl From<Command> for Role {
    fn from(command: Command) -> Self {
        match command {
            Command::Ingress { rps } => Role::Ingress { rps },
            Command::Indexer => Role::Indexer,
            Command::Server => Role::Server,
            Command::All { rps } => Role::All { rps },
        }
    }
}
