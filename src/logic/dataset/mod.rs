//! Dataset Module - Sensor CSV Preparation
//!
//! Turns aligned feature/label time series into header-less CSV rows and
//! stores them as user-scoped files ready for upload.
//!
//! ## Structure
//! - `formatter.rs` - Validation + row serialization (pure)
//! - `writer.rs` - Timestamped file naming and atomic writes

pub mod formatter;
pub mod writer;

#[cfg(test)]
mod tests;

pub use formatter::DataFormatter;
pub use writer::{CsvFile, CsvWriter};

/// Formatting / validation errors. Everything except `Io` is raised before
/// touching the filesystem.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("Feature data missing")]
    MissingFeatures,
    #[error("Label data missing")]
    MissingLabels,
    #[error("Expected {expected} feature channels, got {actual}")]
    FeatureCountMismatch { expected: usize, actual: usize },
    #[error("Feature channel {channel} has {actual} samples, expected {expected}")]
    RaggedFeatures {
        channel: usize,
        expected: usize,
        actual: usize,
    },
    #[error("Feature channels are empty")]
    EmptySeries,
    #[error("Expected {expected} label rows, got {actual}")]
    LabelCountMismatch { expected: usize, actual: usize },
    #[error("Label row {row} has {actual} values, expected {expected}")]
    LabelWidthMismatch {
        row: usize,
        expected: usize,
        actual: usize,
    },
    #[error("Expected {expected} timestamps, got {actual}")]
    TimestampCountMismatch { expected: usize, actual: usize },
    #[error("Non-finite value at row {row}, column {column}")]
    NonFinite { row: usize, column: usize },
    #[error("Invalid user id: '{0}'")]
    InvalidUser(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
