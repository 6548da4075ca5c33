//! Upload Ledger - Durable Retry Queue
//!
//! Remembers uploads that failed so they can be retried later without
//! re-deriving the data. Backed by two parallel ordered sequences (local file
//! names, remote keys) in two files.
//!
//! # Failure Strategy
//! Sequences of different length (or an unreadable file) mean corruption:
//! both sequences are reset to empty and the caller is told. Nothing is repaired.
//!
//! Every operation runs under one async mutex, so record / retry / clear never
//! interleave and the sequences stay equal in length.

pub mod storage;

#[cfg(test)]
mod tests;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::logic::config::SdkConfig;
use crate::logic::transfer::{guarded, CancelToken, TransferClient};

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Nothing to retry")]
    NothingToRetry,
    #[error("Ledger corrupted and reset: {0}")]
    Corrupted(String),
    #[error("Invalid ledger entry: {0}")]
    InvalidEntry(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// One failed upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Path relative to the upload directory
    pub local_name: String,
    /// Object key in storage
    pub remote_name: String,
}

impl LedgerEntry {
    pub fn new(local_name: impl Into<String>, remote_name: impl Into<String>) -> Self {
        Self {
            local_name: local_name.into(),
            remote_name: remote_name.into(),
        }
    }
}

/// Outcome of one retry pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct RetryReport {
    pub uploaded: Vec<LedgerEntry>,
    /// Still failing, in original order; this is the new ledger
    pub pending: Vec<LedgerEntry>,
}

pub struct UploadLedger {
    files: SequenceFiles,
    artifact_dir: PathBuf,
    transfer: Arc<dyn TransferClient>,
    timeout: Duration,
    cancel: CancelToken,
    lock: tokio::sync::Mutex<()>,
}

impl UploadLedger {
    pub fn new(config: &SdkConfig, transfer: Arc<dyn TransferClient>) -> Self {
        Self {
            files: SequenceFiles {
                local: config.ledger_local_path(),
                remote: config.ledger_remote_path(),
            },
            artifact_dir: config.upload_dir(),
            transfer,
            timeout: config.timeout(),
            cancel: CancelToken::new(),
            lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Token that cancels uploads of the retry pass in flight; later passes are unaffected
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn artifact_dir(&self) -> &Path {
        &self.artifact_dir
    }

    /// Append one failed upload
    pub async fn record(&self, local_name: &str, remote_name: &str) -> Result<(), LedgerError> {
        validate_local_name(local_name)?;
        if remote_name.is_empty() {
            return Err(LedgerError::InvalidEntry("remote name is empty".to_string()));
        }

        let _guard = self.lock.lock().await;
        match self.read_entries().await {
            Ok(mut entries) => {
                entries.push(LedgerEntry::new(local_name, remote_name));
                let pending = entries.len();
                self.write_entries(entries).await?;
                log::info!("Upload deferred: {} -> {} ({} pending)", local_name, remote_name, pending);
                Ok(())
            }
            Err(LedgerError::Corrupted(reason)) => {
                log::error!("Upload ledger corrupted ({}), resetting", reason);
                self.write_entries(Vec::new()).await?;
                // Nothing references this file any more
                self.remove_artifact(local_name).await;
                Err(LedgerError::Corrupted(reason))
            }
            Err(e) => Err(e),
        }
    }

    /// Re-upload every entry once; failures stay queued in original order
    pub async fn retry_all(&self) -> Result<RetryReport, LedgerError> {
        let cancel = self.cancel.renew();
        let _guard = self.lock.lock().await;

        let entries = match self.read_entries().await {
            Ok(entries) => entries,
            Err(LedgerError::Corrupted(reason)) => {
                log::error!("Upload ledger corrupted ({}), resetting", reason);
                self.write_entries(Vec::new()).await?;
                return Err(LedgerError::Corrupted(reason));
            }
            Err(e) => return Err(e),
        };
        if entries.is_empty() {
            return Err(LedgerError::NothingToRetry);
        }

        log::info!("Retrying {} deferred uploads", entries.len());
        let mut report = RetryReport::default();

        for entry in entries {
            let path = self.artifact_dir.join(&entry.local_name);
            let upload = guarded(
                self.timeout,
                &cancel,
                self.transfer.upload(&path, &entry.remote_name),
            )
            .await;

            match upload {
                Ok(()) => {
                    self.remove_artifact(&entry.local_name).await;
                    report.uploaded.push(entry);
                }
                Err(e) => {
                    log::warn!("Retry of {} failed: {}", entry.remote_name, e);
                    report.pending.push(entry);
                }
            }
        }

        self.write_entries(report.pending.clone()).await?;
        log::info!(
            "Retry pass done: {} uploaded, {} still pending",
            report.uploaded.len(),
            report.pending.len()
        );
        Ok(report)
    }

    /// Drop every entry and its local file. Returns how many entries were dropped.
    pub async fn clear(&self) -> Result<usize, LedgerError> {
        let _guard = self.lock.lock().await;

        // Best effort: use whatever local names are still readable
        let local_names = self.on_files(|files| Ok(files.readable_local_names())).await?;
        for name in &local_names {
            self.remove_artifact(name).await;
        }

        self.write_entries(Vec::new()).await?;
        log::info!("Upload ledger cleared ({} entries)", local_names.len());
        Ok(local_names.len())
    }

    /// Snapshot of pending entries
    pub async fn entries(&self) -> Result<Vec<LedgerEntry>, LedgerError> {
        let _guard = self.lock.lock().await;
        self.read_entries().await
    }

    pub async fn len(&self) -> Result<usize, LedgerError> {
        Ok(self.entries().await?.len())
    }

    pub async fn is_empty(&self) -> Result<bool, LedgerError> {
        Ok(self.len().await? == 0)
    }

    // ========================================================================
    // INTERNALS (caller holds the lock)
    // ========================================================================

    /// Run blocking file work off the async worker threads
    async fn on_files<T, F>(&self, work: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&SequenceFiles) -> Result<T, LedgerError> + Send + 'static,
        T: Send + 'static,
    {
        let files = self.files.clone();
        tokio::task::spawn_blocking(move || work(&files))
            .await
            .map_err(|e| LedgerError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?
    }

    async fn read_entries(&self) -> Result<Vec<LedgerEntry>, LedgerError> {
        self.on_files(|files| files.read()).await
    }

    async fn write_entries(&self, entries: Vec<LedgerEntry>) -> Result<(), LedgerError> {
        self.on_files(move |files| files.write(&entries)).await
    }

    async fn remove_artifact(&self, local_name: &str) {
        if validate_local_name(local_name).is_err() {
            return;
        }
        let path = self.artifact_dir.join(local_name);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("Could not remove {:?}: {}", path, e),
        }
    }
}

// ============================================================================
// SEQUENCE FILES
// ============================================================================

/// The two parallel sequence files
#[derive(Debug, Clone)]
struct SequenceFiles {
    local: PathBuf,
    remote: PathBuf,
}

impl SequenceFiles {
    fn read(&self) -> Result<Vec<LedgerEntry>, LedgerError> {
        let local = storage::load_sequence(&self.local)?;
        let remote = storage::load_sequence(&self.remote)?;

        let (local, remote) = match (local, remote) {
            (None, None) => return Ok(Vec::new()),
            (Some(l), Some(r)) => (l, r),
            (l, r) => {
                return Err(LedgerError::Corrupted(format!(
                    "one sequence missing (local: {}, remote: {})",
                    l.is_some(),
                    r.is_some()
                )))
            }
        };

        if local.len() != remote.len() {
            return Err(LedgerError::Corrupted(format!(
                "{} local names vs {} remote names",
                local.len(),
                remote.len()
            )));
        }

        Ok(local
            .into_iter()
            .zip(remote)
            .map(|(local_name, remote_name)| LedgerEntry { local_name, remote_name })
            .collect())
    }

    /// Stage both files before replacing either; a failed stage leaves the
    /// previous pair in place
    fn write(&self, entries: &[LedgerEntry]) -> Result<(), LedgerError> {
        let local: Vec<String> = entries.iter().map(|e| e.local_name.clone()).collect();
        let remote: Vec<String> = entries.iter().map(|e| e.remote_name.clone()).collect();

        let staged_local = storage::stage_sequence(&self.local, &local)?;
        let staged_remote = match storage::stage_sequence(&self.remote, &remote) {
            Ok(path) => path,
            Err(e) => {
                storage::discard_staged(&staged_local);
                return Err(e);
            }
        };

        if let Err(e) = storage::commit_sequence(&staged_local, &self.local) {
            storage::discard_staged(&staged_local);
            storage::discard_staged(&staged_remote);
            return Err(e);
        }
        storage::commit_sequence(&staged_remote, &self.remote)
    }

    fn readable_local_names(&self) -> Vec<String> {
        match storage::load_sequence(&self.local) {
            Ok(names) => names.unwrap_or_default(),
            Err(e) => {
                log::warn!("Clearing unreadable ledger: {}", e);
                Vec::new()
            }
        }
    }
}

/// Local names are relative paths that stay inside the upload directory
fn validate_local_name(name: &str) -> Result<(), LedgerError> {
    let inside = !name.is_empty()
        && Path::new(name)
            .components()
            .all(|c| matches!(c, std::path::Component::Normal(_)));
    if !inside {
        return Err(LedgerError::InvalidEntry(format!("bad local name '{}'", name)));
    }
    Ok(())
}
