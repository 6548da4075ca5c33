//! SDK-wide error type
//!
//! Each component keeps its own error enum; `SdkError` wraps them for callers
//! of the `Sdk` facade.

use super::dataset::FormatError;
use super::ledger::LedgerError;
use super::metadata::MetadataError;
use super::model::{ModelError, RuntimeError};
use super::transfer::TransferError;

#[derive(Debug, thiserror::Error)]
pub enum SdkError {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Transfer(#[from] TransferError),
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SdkResult<T> = Result<T, SdkError>;

impl SdkError {
    /// Caller-side mistakes, detected before any I/O
    pub fn is_validation(&self) -> bool {
        match self {
            SdkError::Format(e) => !matches!(e, FormatError::Io(_)),
            SdkError::Metadata(MetadataError::Validation(_)) => true,
            SdkError::Transfer(TransferError::InvalidKey(_)) => true,
            SdkError::Ledger(LedgerError::InvalidEntry(_)) => true,
            SdkError::Model(e) => matches!(
                e,
                ModelError::InvalidInput(_) | ModelError::ArityMismatch { .. } | ModelError::InputKindMismatch(_)
            ),
            _ => false,
        }
    }
}
