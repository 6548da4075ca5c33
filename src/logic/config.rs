//! SDK configuration
//!
//! One value threaded through every component at construction. No process-wide state.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants;

/// Ledger file holding local artifact names
const LEDGER_LOCAL_FILE: &str = "pending_local_names.json";

/// Ledger file holding remote object keys
const LEDGER_REMOTE_FILE: &str = "pending_remote_names.json";

/// Fixed slot for the downloaded model artifact
const MODEL_ARTIFACT_FILE: &str = "model_artifact.onnx";

/// SDK configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SdkConfig {
    /// Root directory for every file the SDK writes
    pub data_dir: PathBuf,
    /// Object storage endpoint
    pub storage_url: String,
    /// Bucket for uploads and model artifacts
    pub bucket: String,
    /// Metadata service endpoint
    pub metadata_url: String,
    /// Metadata table name
    pub metadata_table: String,
    /// Timeout for network-bound calls in seconds
    pub timeout_secs: u64,
    /// Request the accelerator for forward passes when the runtime has one
    pub use_accelerator: bool,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            data_dir: constants::get_data_dir(),
            storage_url: constants::get_storage_url(),
            bucket: constants::get_bucket(),
            metadata_url: constants::get_metadata_url(),
            metadata_table: constants::get_metadata_table(),
            timeout_secs: constants::get_timeout_secs(),
            use_accelerator: constants::use_accelerator(),
        }
    }
}

impl SdkConfig {
    /// Configuration rooted at `data_dir`, everything else from the environment
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Load a JSON configuration file
    pub fn load_from_file(path: &Path) -> std::io::Result<Self> {
        let data = std::fs::read(path)?;
        let cfg = serde_json::from_slice(&data)?;
        Ok(cfg)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Directory holding formatted CSV files awaiting upload
    pub fn upload_dir(&self) -> PathBuf {
        self.data_dir.join("uploads")
    }

    pub fn ledger_local_path(&self) -> PathBuf {
        self.data_dir.join("ledger").join(LEDGER_LOCAL_FILE)
    }

    pub fn ledger_remote_path(&self) -> PathBuf {
        self.data_dir.join("ledger").join(LEDGER_REMOTE_FILE)
    }

    pub fn model_artifact_path(&self) -> PathBuf {
        self.data_dir.join("models").join(MODEL_ARTIFACT_FILE)
    }
}
