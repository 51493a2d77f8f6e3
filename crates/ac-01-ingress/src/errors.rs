use thiserror::Error;

/// Errors that stop an ingress run.
#[derive(Debug, Error)]
pub enum IngressError {
    #[error("cannot open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV read failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("rate must be at least one record per second")]
    InvalidRate,
}

/// Why a single CSV row was rejected. Rows are skipped, never fatal.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RowError {
    #[error("expected {expected} columns, found {found}")]
    ColumnCount { expected: usize, found: usize },

    #[error("unparsable date/time {0:?}")]
    Date(String),

    #[error("unparsable {field} value {value:?}")]
    Number { field: &'static str, value: String },

    #[error("unreadable row: {0}")]
    Malformed(String),
}
