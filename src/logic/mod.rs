//! Logic Module - SDK Components
//!
//! ## Structure
//! - `config.rs` - `SdkConfig`, derived file paths
//! - `transfer/` - Object storage boundary (filesystem, REST)
//! - `metadata/` - Metadata records and stores (SQLite, REST)
//! - `model/` - Model refresh + feedforward / recurrent inference
//! - `ledger/` - Durable queue of failed uploads
//! - `dataset/` - Sensor CSV formatting and file output
//! - `error.rs` - `SdkError` umbrella

pub mod config;
pub mod transfer;
pub mod metadata;
pub mod model;
pub mod ledger;
pub mod dataset;
pub mod error;

pub use error::{SdkError, SdkResult};
