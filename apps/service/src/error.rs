use std::fmt;

use thiserror::Error;

/// A measurement attempt that did not complete. Always recoverable.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{stage} returned status code {status}")]
    Status { stage: &'static str, status: u16 },
    #[error("probe timed out after {0} seconds")]
    Timeout(u64),
    #[error("invalid reading: {0}")]
    InvalidReading(String),
    #[error("{0}")]
    Unavailable(String),
}

/// A read or write against the event store failed.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] libsql::Error),
    #[error("connection pool error: {0}")]
    Pool(#[from] deadpool::managed::PoolError<libsql::Error>),
    #[error("corrupt row: {0}")]
    Corrupt(String),
    #[error("refusing to store record: {0}")]
    InvalidRecord(String),
}

/// One rejected field of a runtime configuration update.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FieldRejection {
    pub field: &'static str,
    pub reason: String,
}

impl FieldRejection {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self { field, reason: reason.into() }
    }
}

impl fmt::Display for FieldRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}
