//! # Search Query
//!
//! An immutable description of a search, assembled fluently and translated
//! once into the store's query language.
//!
//! ```rust,ignore
//! let query = SearchQuery::new()
//!     .query("Boeing")
//!     .size(20)
//!     .sort("-date");
//! let dsl = query.to_query_dsl();
//! ```

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value};

/// Field the date range filter and default sort apply to.
pub const DATE_FIELD: &str = "date";

/// A single sort key. `"-field"` parses as descending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortField {
    pub field: String,
    pub ascending: bool,
}

impl SortField {
    /// Parse `"field"` (ascending) or `"-field"` (descending).
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let (field, ascending) = match raw.strip_prefix('-') {
            Some(rest) => (rest.trim(), false),
            None => (raw, true),
        };
        if field.is_empty() {
            return None;
        }
        Some(Self {
            field: field.to_string(),
            ascending,
        })
    }

    fn order(&self) -> &'static str {
        if self.ascending {
            "asc"
        } else {
            "desc"
        }
    }
}

/// Search parameters. Zero/empty values mean "not set".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchQuery {
    pub text: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub skip: usize,
    pub size: usize,
    pub sort: Vec<SortField>,
}

impl SearchQuery {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Free-text query. Blank text is ignored.
    #[must_use]
    pub fn query(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.text = (!text.trim().is_empty()).then_some(text);
        self
    }

    #[must_use]
    pub fn from(mut self, from: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self
    }

    #[must_use]
    pub fn to(mut self, to: DateTime<Utc>) -> Self {
        self.to = Some(to);
        self
    }

    #[must_use]
    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    #[must_use]
    pub fn size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    /// Append a sort key; see [`SortField::parse`]. Invalid keys are ignored.
    #[must_use]
    pub fn sort(mut self, raw: &str) -> Self {
        self.sort.extend(SortField::parse(raw));
        self
    }

    /// Whether the query matches every document.
    #[must_use]
    pub fn is_match_all(&self) -> bool {
        self.text.is_none() && self.from.is_none() && self.to.is_none()
    }

    /// Translate to an Elasticsearch `_search` request body.
    #[must_use]
    pub fn to_query_dsl(&self) -> Value {
        let mut body = Map::new();
        body.insert("query".into(), self.query_clause());
        body.insert("sort".into(), self.sort_clause());
        if self.skip > 0 {
            body.insert("from".into(), json!(self.skip));
        }
        if self.size > 0 {
            body.insert("size".into(), json!(self.size));
        }
        Value::Object(body)
    }

    fn query_clause(&self) -> Value {
        if self.is_match_all() {
            return json!({ "match_all": {} });
        }

        let mut must = Vec::new();
        if let Some(text) = &self.text {
            must.push(json!({ "query_string": { "query": text } }));
        }
        let mut range = Map::new();
        if let Some(from) = self.from {
            range.insert("gte".into(), json!(format_date(from)));
        }
        if let Some(to) = self.to {
            range.insert("lte".into(), json!(format_date(to)));
        }
        if !range.is_empty() {
            must.push(json!({ "range": { DATE_FIELD: range } }));
        }
        json!({ "bool": { "must": must } })
    }

    fn sort_clause(&self) -> Value {
        if self.sort.is_empty() {
            return json!([{ "_score": { "order": "desc" } }]);
        }
        Value::Array(
            self.sort
                .iter()
                .map(|s| json!({ s.field.as_str(): { "order": s.order() } }))
                .collect(),
        )
    }
}

fn format_date(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}
