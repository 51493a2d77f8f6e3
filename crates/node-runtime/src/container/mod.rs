//! # Container
//!
//! Connections shared by every role of one process: the message bus, the
//! document store and the readiness flags.
//!
//! | Address | Backend |
//! |---------|---------|
//! | `memory://` | in-process bus / store, lost on exit |
//! | `nats://host:port` | NATS (build with `--features nats`) |
//! | `http(s)://host:9200` | Elasticsearch |

use crate::config::NodeConfig;
use crate::errors::RuntimeError;
use shared_bus::{InMemoryBus, MessageBus, MEMORY_BUS_ADDRESS};
use shared_store::{DocumentStore, ElasticsearchStore, InMemoryDocumentStore, MEMORY_STORE_URL};
use shared_types::Readiness;
use std::sync::Arc;
use tracing::info;

pub struct Container {
    pub config: NodeConfig,
    pub bus: Arc<dyn MessageBus>,
    pub store: Arc<dyn DocumentStore>,
    pub readiness: Arc<Readiness>,
}

impl Container {
    /// Connect the bus and the store. Either failing is fatal at startup.
    pub async fn connect(config: NodeConfig) -> Result<Self, RuntimeError> {
        let bus = connect_bus(&config.bus.address).await?;
        let store = connect_store(&config).await?;
        Ok(Self::with_connections(config, bus, store))
    }

    /// Use connections that already exist, e.g. shared in-memory ones.
    pub fn with_connections(
        config: NodeConfig,
        bus: Arc<dyn MessageBus>,
        store: Arc<dyn DocumentStore>,
    ) -> Self {
        Self {
            config,
            bus,
            store,
            readiness: Arc::new(Readiness::new()),
        }
    }
}

pub async fn connect_bus(address: &str) -> Result<Arc<dyn MessageBus>, RuntimeError> {
    if address == MEMORY_BUS_ADDRESS {
        info!("Using in-process bus");
        return Ok(Arc::new(InMemoryBus::new()));
    }
    #[cfg(feature = "nats")]
    {
        let bus = shared_bus::NatsBus::connect(address).await?;
        Ok(Arc::new(bus))
    }
    #[cfg(not(feature = "nats"))]
    {
        Err(shared_bus::BusError::Connection(format!(
            "{address}: only {MEMORY_BUS_ADDRESS} is available without the `nats` feature"
        ))
        .into())
    }
}

pub async fn connect_store(config: &NodeConfig) -> Result<Arc<dyn DocumentStore>, RuntimeError> {
    let urls = &config.store.urls;
    if urls.iter().any(|url| url == MEMORY_STORE_URL) {
        info!("Using in-process document store");
        return Ok(Arc::new(InMemoryDocumentStore::new()));
    }
    let store = ElasticsearchStore::new(config.elasticsearch_config())?;
    store.ping().await?;
    info!(urls = ?urls, "Connected to Elasticsearch");
    Ok(Arc::new(store))
}
