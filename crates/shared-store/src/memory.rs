//! # In-Memory Document Store
//!
//! A [`DocumentStore`] kept in process memory. Behaves like a single-node
//! Elasticsearch for the operations the pipeline uses, and records every
//! call so tests can assert on batching.

use crate::query::{SearchQuery, SortField, DATE_FIELD};
use crate::store::{BulkOperation, BulkResponse, DocumentStore, SearchHit, SearchHits, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Page size used when a query leaves `size` unset.
const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Default)]
struct Faults {
    next_create: Option<StoreError>,
    missing_once: HashSet<String>,
    bulk_fail_from: Option<usize>,
}

/// In-process document store.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    indexes: RwLock<HashMap<String, Vec<(String, Value)>>>,
    bulk_calls: Mutex<Vec<usize>>,
    create_calls: Mutex<usize>,
    faults: Mutex<Faults>,
}

impl InMemoryDocumentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sizes of every bulk request received, in order, including failed ones.
    #[must_use]
    pub fn bulk_calls(&self) -> Vec<usize> {
        self.bulk_calls.lock().clone()
    }

    /// Number of `create_index` calls received.
    #[must_use]
    pub fn create_calls(&self) -> usize {
        *self.create_calls.lock()
    }

    /// Names of existing indexes, sorted.
    #[must_use]
    pub fn index_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.indexes.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// All documents of an index in insertion order.
    #[must_use]
    pub fn documents(&self, index: &str) -> Vec<Value> {
        self.indexes
            .read()
            .get(index)
            .map(|docs| docs.iter().map(|(_, doc)| doc.clone()).collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn document(&self, index: &str, id: &str) -> Option<Value> {
        self.indexes
            .read()
            .get(index)?
            .iter()
            .find(|(doc_id, _)| doc_id == id)
            .map(|(_, doc)| doc.clone())
    }

    // =========================================================================
    // FAULT INJECTION
    // =========================================================================

    /// Make the next `create_index` fail with `error`.
    pub fn fail_next_create(&self, error: StoreError) {
        self.faults.lock().next_create = Some(error);
    }

    /// Make the next `index_exists` for `index` answer false regardless.
    pub fn report_missing_once(&self, index: &str) {
        self.faults.lock().missing_once.insert(index.to_string());
    }

    /// Fail every bulk request from the `call`-th one on (1-based).
    pub fn fail_bulk_from(&self, call: usize) {
        self.faults.lock().bulk_fail_from = Some(call);
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn index_exists(&self, index: &str) -> Result<bool, StoreError> {
        if self.faults.lock().missing_once.remove(index) {
            return Ok(false);
        }
        Ok(self.indexes.read().contains_key(index))
    }

    async fn create_index(&self, index: &str) -> Result<(), StoreError> {
        *self.create_calls.lock() += 1;
        if let Some(error) = self.faults.lock().next_create.take() {
            return Err(error);
        }
        let mut indexes = self.indexes.write();
        if indexes.contains_key(index) {
            return Err(StoreError::IndexAlreadyExists(index.to_string()));
        }
        indexes.insert(index.to_string(), Vec::new());
        Ok(())
    }

    async fn bulk(&self, operations: Vec<BulkOperation>) -> Result<BulkResponse, StoreError> {
        let call = {
            let mut calls = self.bulk_calls.lock();
            calls.push(operations.len());
            calls.len()
        };
        if matches!(self.faults.lock().bulk_fail_from, Some(from) if call >= from) {
            return Err(StoreError::Connection("injected bulk failure".into()));
        }

        let succeeded = operations.len();
        let mut indexes = self.indexes.write();
        for op in operations {
            let docs = indexes.entry(op.index).or_default();
            match docs.iter_mut().find(|(id, _)| *id == op.id) {
                Some((_, doc)) => *doc = op.document,
                None => docs.push((op.id, op.document)),
            }
        }
        debug!(call, documents = succeeded, "Bulk applied");
        Ok(BulkResponse {
            succeeded,
            failed: 0,
        })
    }

    async fn search(&self, index: &str, query: &SearchQuery) -> Result<SearchHits, StoreError> {
        let indexes = self.indexes.read();
        let docs = indexes
            .get(index)
            .ok_or_else(|| StoreError::IndexNotFound(index.to_string()))?;

        let mut matched: Vec<&(String, Value)> =
            docs.iter().filter(|(_, doc)| matches(doc, query)).collect();
        if !query.sort.is_empty() {
            matched.sort_by(|(_, a), (_, b)| compare(a, b, &query.sort));
        }

        let size = if query.size == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            query.size
        };
        let hits = matched
            .iter()
            .skip(query.skip)
            .take(size)
            .map(|(id, doc)| SearchHit {
                id: id.clone(),
                score: None,
                source: doc.clone(),
            })
            .collect();

        Ok(SearchHits {
            total: matched.len() as u64,
            hits,
        })
    }
}

fn matches(doc: &Value, query: &SearchQuery) -> bool {
    if let Some(text) = &query.text {
        let needle = text.to_lowercase();
        let found = doc.as_object().is_some_and(|fields| {
            fields
                .values()
                .filter_map(Value::as_str)
                .any(|s| s.to_lowercase().contains(&needle))
        });
        if !found {
            return false;
        }
    }
    if query.from.is_none() && query.to.is_none() {
        return true;
    }
    let Some(date) = doc
        .get(DATE_FIELD)
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<DateTime<Utc>>().ok())
    else {
        return false;
    };
    query.from.map_or(true, |from| date >= from) && query.to.map_or(true, |to| date <= to)
}

fn compare(a: &Value, b: &Value, sort: &[SortField]) -> Ordering {
    for key in sort {
        let ordering = match (a.get(&key.field), b.get(&key.field)) {
            (Some(x), Some(y)) => compare_values(x, y),
            (Some(_), None) => return Ordering::Less,
            (None, Some(_)) => return Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        let ordering = if key.ascending {
            ordering
        } else {
            ordering.reverse()
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}
