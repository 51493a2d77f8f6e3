//! Google Geocoding API adapter.
//!
//! Certificate verification stays on unless `accept_invalid_certs` is set
//! explicitly. An outbound proxy is optional.

use crate::ports::{GeocodeError, Geocoder};
use async_trait::async_trait;
use reqwest::{Client, Proxy};
use serde::Deserialize;
use shared_types::Location;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_ENDPOINT: &str = "https://maps.googleapis.com/maps/api/geocode/json";

/// Client settings for [`GoogleGeocoder`].
#[derive(Debug, Clone)]
pub struct GeocoderConfig {
    pub endpoint: String,
    pub api_key: String,
    /// Proxy URL for all outbound requests, e.g. `http://10.0.0.1:8080`.
    pub proxy: Option<String>,
    /// Skip TLS certificate verification. Never enable outside a lab.
    pub accept_invalid_certs: bool,
    pub timeout: Duration,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: String::new(),
            proxy: None,
            accept_invalid_certs: false,
            timeout: Duration::from_secs(10),
        }
    }
}

pub struct GoogleGeocoder {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl GoogleGeocoder {
    pub fn new(config: GeocoderConfig) -> Result<Self, GeocodeError> {
        if config.api_key.trim().is_empty() {
            return Err(GeocodeError::Config("API key is empty".into()));
        }

        let mut builder = Client::builder().timeout(config.timeout);
        if let Some(proxy) = config.proxy.as_deref().filter(|p| !p.is_empty()) {
            let proxy = Proxy::all(proxy).map_err(|e| GeocodeError::Config(e.to_string()))?;
            builder = builder.proxy(proxy);
        }
        if config.accept_invalid_certs {
            warn!("TLS certificate verification disabled for geocoder");
            builder = builder.danger_accept_invalid_certs(true);
        }
        let client = builder
            .build()
            .map_err(|e| GeocodeError::Config(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint,
            api_key: config.api_key,
        })
    }
}

#[async_trait]
impl Geocoder for GoogleGeocoder {
    async fn geocode(&self, address: &str) -> Result<Vec<Location>, GeocodeError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("address", address), ("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| GeocodeError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeocodeError::Api {
                status: status.to_string(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let body: GeocodeResponse = response
            .json()
            .await
            .map_err(|e| GeocodeError::Decode(e.to_string()))?;
        let locations = body.into_locations()?;
        debug!(address = %address, results = locations.len(), "Geocoded");
        Ok(locations)
    }
}

// =============================================================================
// WIRE FORMAT
// =============================================================================

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

impl GeocodeResponse {
    fn into_locations(self) -> Result<Vec<Location>, GeocodeError> {
        match self.status.as_str() {
            "OK" => Ok(self
                .results
                .into_iter()
                .map(|r| Location::new(r.geometry.location.lat, r.geometry.location.lng))
                .collect()),
            "ZERO_RESULTS" => Ok(Vec::new()),
            _ => Err(GeocodeError::Api {
                status: self.status,
                message: self.error_message.unwrap_or_default(),
            }),
        }
    }
}
