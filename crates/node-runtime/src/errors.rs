use ac_01_ingress::IngressError;
use ac_02_indexer::{GeocodeError, IndexerError};
use ac_03_live_feed::FeedError;
use shared_bus::BusError;
use shared_store::StoreError;
use std::io;
use thiserror::Error;

/// Failures that stop a role.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("bus: {0}")]
    Bus(#[from] BusError),

    #[error("store: {0}")]
    Store(#[from] StoreError),

    #[error("geocoder: {0}")]
    Geocoder(#[from] GeocodeError),

    #[error("ingress: {0}")]
    Ingress(#[from] IngressError),

    #[error("indexer: {0}")]
    Indexer(#[from] IndexerError),

    #[error("live feed: {0}")]
    Feed(#[from] FeedError),

    #[error("cannot bind HTTP port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("HTTP server: {0}")]
    Http(#[source] io::Error),

    #[error("task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
