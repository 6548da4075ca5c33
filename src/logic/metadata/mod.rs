//! Metadata Module - Key-Range Database Boundary
//!
//! Persists metadata records keyed by (userID, eventDate) and queries them by
//! user and date range. Records are written once and never mutated by the SDK.
//!
//! # Backends
//! - `sqlite.rs`: local table (rusqlite)
//! - `http.rs`: managed document store over REST

pub mod record;
pub mod sqlite;
pub mod http;

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use http::HttpMetadataStore;
pub use record::MetadataRecord;
pub use sqlite::SqliteMetadataStore;

#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Server error: {0}")]
    Server(u16),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for MetadataError {
    fn from(err: rusqlite::Error) -> Self {
        MetadataError::Database(err.to_string())
    }
}

/// Metadata store boundary
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Persist one record; overwrite semantics belong to the backend
    async fn put(&self, record: &MetadataRecord) -> Result<(), MetadataError>;

    /// Records for `user_id` with `start <= eventDate <= end`, ascending by date
    async fn query(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<MetadataRecord>, MetadataError>;

    /// Delete every record of `user_id`, returning how many were removed
    async fn delete_all(&self, user_id: &str) -> Result<usize, MetadataError>;
}

/// Checked before any backend I/O
pub(crate) fn validate_query(user_id: &str, start: &DateTime<Utc>, end: &DateTime<Utc>) -> Result<(), MetadataError> {
    if user_id.trim().is_empty() {
        return Err(MetadataError::Validation("userID must not be empty".to_string()));
    }
    if start > end {
        return Err(MetadataError::Validation(format!(
            "invalid date range: {} is after {}",
            start, end
        )));
    }
    Ok(())
}
