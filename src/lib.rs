//! Sensor ML SDK
//!
//! Client-side toolkit for sensor apps:
//! - refresh a model artifact from object storage and run feedforward or
//!   recurrent prediction through a pluggable runtime (ONNX Runtime by default)
//! - format aligned sensor series as CSV and upload them with metadata
//! - keep failed uploads in a durable ledger and retry them later
//!
//! ## Structure
//! - `constants.rs` - Defaults and environment overrides
//! - `logic/` - Components (transfer, metadata, model, ledger, dataset)
//! - `api/` - `Sdk` facade wiring the components together

pub mod api;
pub mod constants;
pub mod logic;

pub use api::{RemovalReport, Sdk, SensorBatch, UploadReceipt, UploadStatus};
pub use logic::config::SdkConfig;
pub use logic::dataset::DataFormatter;
pub use logic::ledger::{LedgerEntry, LedgerError, RetryReport, UploadLedger};
pub use logic::metadata::{
    HttpMetadataStore, MetadataError, MetadataRecord, MetadataStore, SqliteMetadataStore,
};
pub use logic::model::{
    ForwardOptions, ModelController, ModelError, ModelInput, ModelKind, ModelRuntime, ModelStatus,
    OrtRuntime, OrtRuntimeConfig, Tensor,
};
pub use logic::transfer::{
    CancelToken, FsTransferClient, HttpTransferClient, TransferClient, TransferError,
};
pub use logic::{SdkError, SdkResult};

/// Install the `env_logger` backend (`RUST_LOG`, default `info`).
/// Safe to call more than once; later calls are ignored.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}
