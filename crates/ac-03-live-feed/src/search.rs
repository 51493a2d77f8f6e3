//! Flight search over the document store.

use crate::errors::FeedError;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use shared_store::{DocumentStore, SearchQuery};
use shared_types::FlightCrash;
use std::sync::Arc;
use tracing::{debug, warn};

/// Page size when the request does not give one.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Results are always newest first.
pub const RESULT_SORT: &str = "-date";

const NAIVE_TIMESTAMP: &str = "%Y-%m-%dT%H:%M:%S";

/// One page of results plus the number of matching records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub data: Vec<FlightCrash>,
    pub total: u64,
}

/// Raw query-string parameters of `GET /api/flights`.
///
/// Everything is kept as text so a malformed value falls back to its default
/// instead of rejecting the request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchParams {
    pub query: Option<String>,
    /// Lower bound on `date`. RFC 3339, or a timestamp without an offset
    /// (`1912-04-15T00:00:00`), which is taken as UTC. No local zone is
    /// assumed for bare timestamps.
    pub from: Option<String>,
    /// Upper bound on `date`, parsed like `from`.
    pub to: Option<String>,
    /// Page size.
    pub l: Option<String>,
    /// Records to skip.
    pub s: Option<String>,
}

impl SearchParams {
    pub fn to_query(&self) -> SearchQuery {
        let mut query = SearchQuery::new()
            .query(self.query.clone().unwrap_or_default())
            .size(parse_count(self.l.as_deref()).unwrap_or(DEFAULT_PAGE_SIZE))
            .skip(parse_count(self.s.as_deref()).unwrap_or(0))
            .sort(RESULT_SORT);
        if let Some(from) = parse_bound("from", self.from.as_deref()) {
            query = query.from(from);
        }
        if let Some(to) = parse_bound("to", self.to.as_deref()) {
            query = query.to(to);
        }
        query
    }
}

fn parse_count(raw: Option<&str>) -> Option<usize> {
    raw?.trim().parse().ok()
}

fn parse_bound(name: &str, raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw.map(str::trim).filter(|r| !r.is_empty())?;
    let parsed = parse_timestamp(raw);
    if parsed.is_none() {
        warn!(param = name, value = raw, "Unparsable time ignored");
    }
    parsed
}

/// RFC 3339, or `YYYY-MM-DDTHH:MM:SS` read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, NAIVE_TIMESTAMP)
                .ok()
                .map(|t| t.and_utc())
        })
}

pub struct FlightSearch {
    store: Arc<dyn DocumentStore>,
    index: String,
}

impl FlightSearch {
    pub fn new(store: Arc<dyn DocumentStore>, index: impl Into<String>) -> Self {
        Self {
            store,
            index: index.into(),
        }
    }

    pub async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, FeedError> {
        let hits = self.store.search(&self.index, query).await?;
        let data: Vec<FlightCrash> = hits
            .hits
            .into_iter()
            .filter_map(|hit| match serde_json::from_value::<FlightCrash>(hit.source) {
                Ok(record) => Some(FlightCrash {
                    score: hit.score,
                    ..record.with_id(hit.id)
                }),
                Err(e) => {
                    warn!(id = %hit.id, error = %e, "Stored document is not a flight crash");
                    None
                }
            })
            .collect();
        debug!(index = %self.index, returned = data.len(), total = hits.total, "Search done");
        Ok(SearchResponse {
            data,
            total: hits.total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use shared_store::{BulkOperation, InMemoryDocumentStore, SortField, StoreError};

    fn params(pairs: &[(&str, &str)]) -> SearchParams {
        let mut params = SearchParams::default();
        for (key, value) in pairs {
            let value = Some(value.to_string());
            match *key {
                "query" => params.query = value,
                "from" => params.from = value,
                "to" => params.to = value,
                "l" => params.l = value,
                "s" => params.s = value,
                _ => unreachable!(),
            }
        }
        params
    }

    #[test]
    fn test_defaults() {
        let query = params(&[]).to_query();
        assert!(query.is_match_all());
        assert_eq!(query.size, DEFAULT_PAGE_SIZE);
        assert_eq!(query.skip, 0);
        assert_eq!(
            query.sort,
            vec![SortField {
                field: "date".into(),
                ascending: false
            }]
        );
    }

    #[test]
    fn test_bad_numbers_fall_back() {
        let query = params(&[("l", "lots"), ("s", "-3")]).to_query();
        assert_eq!(query.size, DEFAULT_PAGE_SIZE);
        assert_eq!(query.skip, 0);

        let query = params(&[("l", "25"), ("s", "50")]).to_query();
        assert_eq!(query.size, 25);
        assert_eq!(query.skip, 50);
    }

    #[test]
    fn test_time_bounds() {
        let query = params(&[
            ("query", "Boeing"),
            ("from", "1970-01-01T00:00:00"),
            ("to", "1980-06-30T12:00:00+02:00"),
        ])
        .to_query();
        assert_eq!(query.text.as_deref(), Some("Boeing"));
        assert_eq!(query.from, Some(Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap()));
        assert_eq!(query.to, Some(Utc.with_ymd_and_hms(1980, 6, 30, 10, 0, 0).unwrap()));
    }

    #[test]
    fn test_unparsable_time_ignored() {
        let query = params(&[("from", "last tuesday"), ("to", "")]).to_query();
        assert!(query.from.is_none());
        assert!(query.to.is_none());
    }

    #[tokio::test]
    async fn test_hits_carry_id_and_total() {
        let store = Arc::new(InMemoryDocumentStore::new());
        store
            .bulk(vec![
                BulkOperation::index("flights", "a", json!({"location": "Tenerife", "date": "1977-03-27T17:06:00Z"})),
                BulkOperation::index("flights", "b", json!({"location": "Paris", "date": "1974-03-03T12:41:00Z"})),
                BulkOperation::index("flights", "c", json!({"location": "Tenerife North", "date": "1980-04-25T13:21:00Z"})),
            ])
            .await
            .unwrap();
        let search = FlightSearch::new(store, "flights");

        let response = search
            .search(&SearchQuery::new().query("tenerife").sort(RESULT_SORT))
            .await
            .unwrap();

        assert_eq!(response.total, 2);
        let ids: Vec<&str> = response.data.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a"]);
        assert_eq!(response.data[1].location, "Tenerife");
    }

    #[tokio::test]
    async fn test_missing_index_is_an_error() {
        let search = FlightSearch::new(Arc::new(InMemoryDocumentStore::new()), "flights");
        let err = search.search(&SearchQuery::new()).await.unwrap_err();
        assert!(matches!(err, FeedError::Search(StoreError::IndexNotFound(_))));
    }
}
