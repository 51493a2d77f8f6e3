//! # Node Configuration
//!
//! One TOML file configures every role. Each section falls back to its
//! defaults, so a file only needs the values that differ.
//!
//! ```toml
//! [bus]
//! address = "nats://localhost:4222"
//!
//! [store]
//! urls = ["http://localhost:9200"]
//! bulk_size = 100
//! ```
//!
//! ## Environment overrides
//!
//! | Variable | Overrides |
//! |----------|-----------|
//! | `GOOGLE_MAPS_API_KEY` | `geocoder.api_key` |
//! | `AC_BUS_ADDRESS` | `bus.address` |
//! | `AC_HTTP_PORT` | `http.port` |

use ac_01_ingress::DEFAULT_RPS;
use ac_02_indexer::{adapters::topics, CommitConfig, GeocoderConfig, IndexerConfig};
use ac_03_live_feed::{PumpConfig, DEFAULT_LISTENER_BUFFER, DEFAULT_PING_INTERVAL};
use serde::Deserialize;
use shared_store::ElasticsearchConfig;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const ENV_API_KEY: &str = "GOOGLE_MAPS_API_KEY";
pub const ENV_BUS_ADDRESS: &str = "AC_BUS_ADDRESS";
pub const ENV_HTTP_PORT: &str = "AC_HTTP_PORT";

pub const DEFAULT_CONFIG_PATH: &str = "config/conf.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {var}: {value:?}")]
    InvalidEnv { var: &'static str, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Complete node configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub bus: BusConfig,
    pub store: StoreConfig,
    pub http: HttpConfig,
    pub geocoder: GeocoderSection,
    pub ingress: IngressConfig,
    pub feed: FeedConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// `nats://host:port` or `memory://`.
    pub address: String,
    /// Raw records, written by ingress and read by the indexer.
    pub topic: String,
    /// Enriched records, written by the indexer and read by the server.
    pub out_topic: String,
    /// Indexer replicas sharing this group split the input. Empty disables.
    pub queue_group: String,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            address: "nats://localhost:4222".to_string(),
            topic: topics::FLIGHTS.to_string(),
            out_topic: topics::FLIGHTS_ENRICHED.to_string(),
            queue_group: topics::INDEXER_QUEUE_GROUP.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Elasticsearch node URLs, or `["memory://"]`.
    pub urls: Vec<String>,
    pub index: String,
    pub bulk_size: usize,
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            urls: vec!["http://localhost:9200".to_string()],
            index: ac_02_indexer::DEFAULT_INDEX.to_string(),
            bulk_size: ac_02_indexer::DEFAULT_BULK_SIZE,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub port: u16,
    pub graceful_shutdown_timeout_secs: u64,
    /// Time between failing the probes and closing the listener.
    pub drain_delay_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            graceful_shutdown_timeout_secs: 30,
            drain_delay_secs: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GeocoderSection {
    pub endpoint: String,
    /// Without a key every lookup reports no match.
    pub api_key: String,
    pub proxy: Option<String>,
    pub accept_invalid_certs: bool,
    pub timeout_secs: u64,
}

impl Default for GeocoderSection {
    fn default() -> Self {
        let defaults = GeocoderConfig::default();
        Self {
            endpoint: defaults.endpoint,
            api_key: defaults.api_key,
            proxy: defaults.proxy,
            accept_invalid_certs: defaults.accept_invalid_certs,
            timeout_secs: defaults.timeout.as_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct IngressConfig {
    pub csv_path: PathBuf,
    /// Records published per second.
    pub rps: u32,
}

impl Default for IngressConfig {
    fn default() -> Self {
        Self {
            csv_path: PathBuf::from("data/crashes.csv"),
            rps: DEFAULT_RPS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub listener_buffer: usize,
    pub ping_interval_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            listener_buffer: DEFAULT_LISTENER_BUFFER,
            ping_interval_secs: DEFAULT_PING_INTERVAL.as_secs(),
        }
    }
}

impl NodeConfig {
    /// Read `path`, apply environment overrides and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&text)?;
        config.apply_overrides(|var| std::env::var(var).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Apply overrides from `lookup`, normally the process environment.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(ENV_API_KEY).filter(|k| !k.is_empty()) {
            self.geocoder.api_key = key;
        }
        if let Some(address) = lookup(ENV_BUS_ADDRESS).filter(|a| !a.is_empty()) {
            self.bus.address = address;
        }
        if let Some(port) = lookup(ENV_HTTP_PORT) {
            self.http.port = port.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                var: ENV_HTTP_PORT,
                value: port,
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));
        if self.bus.address.trim().is_empty() {
            return invalid("bus.address is empty");
        }
        if self.bus.topic.trim().is_empty() || self.bus.out_topic.trim().is_empty() {
            return invalid("bus topics must not be empty");
        }
        if self.store.urls.iter().all(|u| u.trim().is_empty()) {
            return invalid("store.urls is empty");
        }
        if self.store.index.trim().is_empty() {
            return invalid("store.index is empty");
        }
        if self.store.timeout_secs == 0 {
            return invalid("store.timeout_secs must be at least 1");
        }
        if self.geocoder.timeout_secs == 0 {
            return invalid("geocoder.timeout_secs must be at least 1");
        }
        if self.store.bulk_size == 0 {
            return invalid("store.bulk_size must be at least 1");
        }
        if self.ingress.rps == 0 {
            return invalid("ingress.rps must be at least 1");
        }
        if self.feed.listener_buffer == 0 {
            return invalid("feed.listener_buffer must be at least 1");
        }
        if self.feed.ping_interval_secs == 0 {
            return invalid("feed.ping_interval_secs must be at least 1");
        }
        Ok(())
    }

    pub fn indexer_config(&self) -> IndexerConfig {
        let group = self.bus.queue_group.trim();
        IndexerConfig {
            topic: self.bus.topic.clone(),
            queue_group: (!group.is_empty()).then(|| group.to_string()),
            out_topic: self.bus.out_topic.clone(),
            commit: CommitConfig {
                index: self.store.index.clone(),
                bulk_size: self.store.bulk_size,
            },
        }
    }

    pub fn geocoder_config(&self) -> GeocoderConfig {
        GeocoderConfig {
            endpoint: self.geocoder.endpoint.clone(),
            api_key: self.geocoder.api_key.clone(),
            proxy: self.geocoder.proxy.clone(),
            accept_invalid_certs: self.geocoder.accept_invalid_certs,
            timeout: Duration::from_secs(self.geocoder.timeout_secs),
        }
    }

    pub fn elasticsearch_config(&self) -> ElasticsearchConfig {
        ElasticsearchConfig {
            urls: self.store.urls.clone(),
            timeout: Duration::from_secs(self.store.timeout_secs),
        }
    }

    pub fn pump_config(&self) -> PumpConfig {
        PumpConfig {
            ping_interval: Duration::from_secs(self.feed.ping_interval_secs),
            ..Default::default()
        }
    }
}
