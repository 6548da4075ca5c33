//! Transfer Module - Object Storage Boundary
//!
//! Upload and download named blobs, list and delete them by key prefix.
//!
//! ## Structure
//! - `cancel.rs` - CancelToken + timeout guard for network-bound calls
//! - `fs.rs` - Object store rooted at a local directory
//! - `http.rs` - REST object store over reqwest

pub mod cancel;
pub mod fs;
pub mod http;


use std::path::Path;

use async_trait::async_trait;

pub use cancel::{guarded, CancelToken};
pub use fs::FsTransferClient;
pub use http::HttpTransferClient;

/// Transfer errors
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Server error: {0}")]
    Server(u16),
    #[error("Object not found: {0}")]
    NotFound(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Invalid key: {0}")]
    InvalidKey(String),
    #[error("Timed out after {0}s")]
    Timeout(u64),
    #[error("Cancelled")]
    Cancelled,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Object storage boundary
#[async_trait]
pub trait TransferClient: Send + Sync {
    /// Upload the file at `local_path` under `remote_key`
    async fn upload(&self, local_path: &Path, remote_key: &str) -> Result<(), TransferError>;

    /// Download `remote_key` into `local_path`
    async fn download(&self, remote_key: &str, local_path: &Path) -> Result<(), TransferError>;

    /// List every key starting with `prefix`, sorted
    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<String>, TransferError>;

    /// Delete one object
    async fn delete(&self, remote_key: &str) -> Result<(), TransferError>;
}

/// Reject keys that would escape a bucket or address nothing
pub(crate) fn validate_key(key: &str) -> Result<(), TransferError> {
    if key.is_empty() || key.starts_with('/') || key.split('/').any(|seg| seg == "..") {
        return Err(TransferError::InvalidKey(key.to_string()));
    }
    Ok(())
}
