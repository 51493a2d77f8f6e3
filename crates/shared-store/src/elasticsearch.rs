//! # Elasticsearch Store
//!
//! [`DocumentStore`] over the Elasticsearch REST API. Requests rotate across
//! the configured nodes; no cluster sniffing is done.

use crate::query::SearchQuery;
use crate::store::{BulkOperation, BulkResponse, DocumentStore, SearchHit, SearchHits, StoreError};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// Connection settings for [`ElasticsearchStore`].
#[derive(Debug, Clone)]
pub struct ElasticsearchConfig {
    /// Node base URLs, e.g. `http://localhost:9200`.
    pub urls: Vec<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for ElasticsearchConfig {
    fn default() -> Self {
        Self {
            urls: vec!["http://localhost:9200".to_string()],
            timeout: Duration::from_secs(30),
        }
    }
}

/// Elasticsearch-backed document store.
pub struct ElasticsearchStore {
    client: Client,
    nodes: Vec<String>,
    next_node: AtomicUsize,
}

impl ElasticsearchStore {
    /// Build a client for the configured nodes. Does not contact them.
    pub fn new(config: ElasticsearchConfig) -> Result<Self, StoreError> {
        let nodes: Vec<String> = config
            .urls
            .iter()
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .collect();
        if nodes.is_empty() {
            return Err(StoreError::Connection("no Elasticsearch URL configured".into()));
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(Self {
            client,
            nodes,
            next_node: AtomicUsize::new(0),
        })
    }

    /// Check that a node answers. Used at startup.
    pub async fn ping(&self) -> Result<(), StoreError> {
        let response = self
            .client
            .get(self.node())
            .send()
            .await
            .map_err(connection_error)?;
        expect_success(response).await.map(|_| ())
    }

    fn node(&self) -> &str {
        let slot = self.next_node.fetch_add(1, Ordering::Relaxed) % self.nodes.len();
        &self.nodes[slot]
    }
}

#[async_trait]
impl DocumentStore for ElasticsearchStore {
    async fn index_exists(&self, index: &str) -> Result<bool, StoreError> {
        let response = self
            .client
            .head(format!("{}/{}", self.node(), index))
            .send()
            .await
            .map_err(connection_error)?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            _ => Err(unexpected(response).await),
        }
    }

    async fn create_index(&self, index: &str) -> Result<(), StoreError> {
        let response = self
            .client
            .put(format!("{}/{}", self.node(), index))
            .send()
            .await
            .map_err(connection_error)?;
        if response.status().is_success() {
            return Ok(());
        }
        match unexpected(response).await {
            StoreError::Response { body, .. } if body.contains("resource_already_exists_exception") => {
                Err(StoreError::IndexAlreadyExists(index.to_string()))
            }
            other => Err(other),
        }
    }

    async fn bulk(&self, operations: Vec<BulkOperation>) -> Result<BulkResponse, StoreError> {
        if operations.is_empty() {
            return Ok(BulkResponse::default());
        }
        let body = bulk_body(&operations)?;
        let response = self
            .client
            .post(format!("{}/_bulk", self.node()))
            .header("Content-Type", "application/x-ndjson")
            .body(body)
            .send()
            .await
            .map_err(connection_error)?;
        let reply = expect_success(response).await?;
        let outcome = parse_bulk_reply(&reply)?;
        if outcome.failed > 0 {
            warn!(
                failed = outcome.failed,
                succeeded = outcome.succeeded,
                "Bulk request had item failures"
            );
        }
        Ok(outcome)
    }

    async fn search(&self, index: &str, query: &SearchQuery) -> Result<SearchHits, StoreError> {
        let dsl = query.to_query_dsl();
        debug!(index = %index, query = %dsl, "Executing search");
        let response = self
            .client
            .post(format!("{}/{}/_search", self.node(), index))
            .json(&dsl)
            .send()
            .await
            .map_err(connection_error)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::IndexNotFound(index.to_string()));
        }
        let reply = expect_success(response).await?;
        parse_search_reply(reply)
    }
}

// =============================================================================
// WIRE FORMAT
// =============================================================================

/// Render operations as an NDJSON `_bulk` body.
fn bulk_body(operations: &[BulkOperation]) -> Result<String, StoreError> {
    let mut body = String::new();
    for op in operations {
        let action = json!({ "index": { "_index": op.index, "_id": op.id } });
        for line in [&action, &op.document] {
            let encoded = serde_json::to_string(line)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            body.push_str(&encoded);
            body.push('\n');
        }
    }
    Ok(body)
}

#[derive(Deserialize)]
struct BulkReply {
    #[serde(default)]
    items: Vec<HashMap<String, BulkItem>>,
}

#[derive(Deserialize)]
struct BulkItem {
    status: u16,
}

fn parse_bulk_reply(reply: &Value) -> Result<BulkResponse, StoreError> {
    let reply: BulkReply = serde_json::from_value(reply.clone())
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    let mut outcome = BulkResponse::default();
    for item in reply.items.iter().flat_map(HashMap::values) {
        if item.status < 300 {
            outcome.succeeded += 1;
        } else {
            outcome.failed += 1;
        }
    }
    Ok(outcome)
}

#[derive(Deserialize)]
struct SearchReply {
    hits: HitsEnvelope,
}

#[derive(Deserialize)]
struct HitsEnvelope {
    total: Value,
    #[serde(default)]
    hits: Vec<RawHit>,
}

#[derive(Deserialize)]
struct RawHit {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_score", default)]
    score: Option<f64>,
    #[serde(rename = "_source", default)]
    source: Value,
}

fn parse_search_reply(reply: Value) -> Result<SearchHits, StoreError> {
    let reply: SearchReply =
        serde_json::from_value(reply).map_err(|e| StoreError::Serialization(e.to_string()))?;
    // 6.x reports a bare number, 7.x+ an object with `value`.
    let total = reply
        .hits
        .total
        .as_u64()
        .or_else(|| reply.hits.total.get("value").and_then(Value::as_u64))
        .unwrap_or(0);
    let hits = reply
        .hits
        .hits
        .into_iter()
        .map(|hit| SearchHit {
            id: hit.id,
            score: hit.score,
            source: hit.source,
        })
        .collect();
    Ok(SearchHits { total, hits })
}

fn connection_error(error: reqwest::Error) -> StoreError {
    StoreError::Connection(error.to_string())
}

async fn unexpected(response: Response) -> StoreError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    StoreError::Response { status, body }
}

async fn expect_success(response: Response) -> Result<Value, StoreError> {
    if !response.status().is_success() {
        return Err(unexpected(response).await);
    }
    response
        .json::<Value>()
        .await
        .map_err(|e| StoreError::Serialization(e.to_string()))
}
