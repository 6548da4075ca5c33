//! Central Configuration Constants
//!
//! Single source of truth for configuration defaults.
//! Every value can be overridden through the environment.

use std::path::PathBuf;

/// Default object storage endpoint
pub const DEFAULT_STORAGE_URL: &str = "http://localhost:9000";

/// Default bucket holding sensor uploads and model artifacts
pub const DEFAULT_BUCKET: &str = "sensor-data";

/// Default metadata service endpoint
pub const DEFAULT_METADATA_URL: &str = "http://localhost:8000";

/// Default metadata table name
pub const DEFAULT_METADATA_TABLE: &str = "SensorMetadata";

/// Default timeout for network-bound calls (seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Partition key name used by every metadata backend
pub const USER_ID_KEY: &str = "userID";

/// Sort key name used by every metadata backend
pub const EVENT_DATE_KEY: &str = "eventDate";

/// Maximum number of optional fields on a metadata record
pub const MAX_METADATA_FIELDS: usize = 10;

/// Content type attached to sensor uploads
pub const CSV_CONTENT_TYPE: &str = "text/csv";

/// Directory name under the platform data dir
pub const APP_DIR_NAME: &str = "sensor-ml-sdk";

/// SDK version
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================
// Helper functions to read from env with fallback
// ============================================

/// Get the local data directory from environment or the platform default
pub fn get_data_dir() -> PathBuf {
    std::env::var("SENSOR_SDK_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR_NAME)
        })
}

/// Get object storage URL from environment or use default
pub fn get_storage_url() -> String {
    std::env::var("SENSOR_SDK_STORAGE_URL")
        .unwrap_or_else(|_| DEFAULT_STORAGE_URL.to_string())
}

/// Get bucket name from environment or use default
pub fn get_bucket() -> String {
    std::env::var("SENSOR_SDK_BUCKET")
        .unwrap_or_else(|_| DEFAULT_BUCKET.to_string())
}

/// Get metadata service URL from environment or use default
pub fn get_metadata_url() -> String {
    std::env::var("SENSOR_SDK_METADATA_URL")
        .unwrap_or_else(|_| DEFAULT_METADATA_URL.to_string())
}

/// Get metadata table name from environment or use default
pub fn get_metadata_table() -> String {
    std::env::var("SENSOR_SDK_METADATA_TABLE")
        .unwrap_or_else(|_| DEFAULT_METADATA_TABLE.to_string())
}

/// Get network timeout from environment or use default
pub fn get_timeout_secs() -> u64 {
    std::env::var("SENSOR_SDK_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_TIMEOUT_SECS)
}

/// Check if the accelerator should be requested for forward passes
pub fn use_accelerator() -> bool {
    std::env::var("SENSOR_SDK_USE_ACCELERATOR")
        .map(|s| s.to_lowercase() != "false" && s != "0")
        .unwrap_or(true)
}
