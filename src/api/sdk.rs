//! SDK Facade
//!
//! Wires the transfer client, metadata store, CSV writer and upload ledger from
//! one `SdkConfig` and exposes the application-level flows.
//!
//! Upload flow: format -> write file -> upload `"{userID}/{file}"`.
//! Success removes the local CSV; failure parks it in the ledger for
//! `retry_failed_uploads`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::logic::config::SdkConfig;
use crate::logic::dataset::writer::validate_user;
use crate::logic::dataset::{CsvWriter, DataFormatter};
use crate::logic::ledger::{LedgerEntry, RetryReport, UploadLedger};
use crate::logic::metadata::{HttpMetadataStore, MetadataError, MetadataRecord, MetadataStore};
use crate::logic::model::{ModelController, ModelKind, ModelRuntime};
use crate::logic::transfer::{guarded, CancelToken, HttpTransferClient, TransferClient};
use crate::logic::SdkResult;

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// Aligned sensor series for one upload
#[derive(Debug, Clone, Copy, Default)]
pub struct SensorBatch<'a> {
    /// `features[channel][t]`
    pub features: Option<&'a [Vec<f64>]>,
    /// `labels[t][column]`
    pub labels: Option<&'a [Vec<f64>]>,
    /// Optional leading timestamp column
    pub timestamps: Option<&'a [DateTime<Utc>]>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Uploaded,
    /// Upload failed and the file is queued in the ledger
    Deferred,
}

/// Result of `upload_sensor_data`
#[derive(Debug, Clone, Serialize)]
pub struct UploadReceipt {
    pub remote_key: String,
    pub rows: usize,
    pub bytes: usize,
    pub status: UploadStatus,
    pub upload_error: Option<String>,
    /// Set when the metadata record could not be stored
    pub metadata_error: Option<String>,
}

/// Result of `remove_user_files`
#[derive(Debug, Clone, Default, Serialize)]
pub struct RemovalReport {
    pub removed: Vec<String>,
    pub failed: Vec<(String, String)>,
}

// ============================================================================
// SDK
// ============================================================================

pub struct Sdk {
    config: SdkConfig,
    formatter: DataFormatter,
    transfer: Arc<dyn TransferClient>,
    metadata: Arc<dyn MetadataStore>,
    writer: CsvWriter,
    ledger: UploadLedger,
    cancel: CancelToken,
}

impl Sdk {
    pub fn new(
        config: SdkConfig,
        formatter: DataFormatter,
        transfer: Arc<dyn TransferClient>,
        metadata: Arc<dyn MetadataStore>,
    ) -> Self {
        let writer = CsvWriter::new(config.upload_dir());
        let ledger = UploadLedger::new(&config, transfer.clone());

        log::info!(
            "Sensor SDK v{} ready (data dir {:?}, {} inputs / {} outputs)",
            crate::constants::SDK_VERSION,
            config.data_dir,
            formatter.input_count(),
            formatter.output_count()
        );

        Self {
            config,
            formatter,
            transfer,
            metadata,
            writer,
            ledger,
            cancel: CancelToken::new(),
        }
    }

    /// Build with the REST object store and REST metadata store from `config`
    pub fn connect(config: SdkConfig, formatter: DataFormatter) -> SdkResult<Self> {
        let transfer = Arc::new(HttpTransferClient::new(&config)?);
        let metadata = Arc::new(HttpMetadataStore::new(&config)?);
        Ok(Self::new(config, formatter, transfer, metadata))
    }

    pub fn config(&self) -> &SdkConfig {
        &self.config
    }

    pub fn formatter(&self) -> DataFormatter {
        self.formatter
    }

    pub fn ledger(&self) -> &UploadLedger {
        &self.ledger
    }

    /// Cancels direct uploads and listings in flight. Ledger retries have their own token.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    // ========================================================================
    // SENSOR UPLOADS
    // ========================================================================

    /// Format `batch`, store it as a CSV and upload it under `"{user_id}/{file}"`.
    ///
    /// Validation errors return before anything is written. A failed upload is
    /// not an error: the receipt says `Deferred` and the ledger holds the file.
    pub async fn upload_sensor_data(
        &self,
        user_id: &str,
        batch: SensorBatch<'_>,
        metadata: Option<&MetadataRecord>,
    ) -> SdkResult<UploadReceipt> {
        let cancel = self.cancel.renew();
        validate_user(user_id)?;
        if let Some(record) = metadata {
            if record.user_id() != user_id {
                return Err(MetadataError::Validation(format!(
                    "metadata belongs to '{}', upload to '{}'",
                    record.user_id(),
                    user_id
                ))
                .into());
            }
        }

        let (rows, content) = self
            .formatter
            .format(batch.features, batch.labels, batch.timestamps)?;
        let file = self.writer.write(user_id, &content)?;
        let remote_key = file.local_name.clone();

        let upload = guarded(
            self.config.timeout(),
            &cancel,
            self.transfer.upload(&file.path, &remote_key),
        )
        .await;

        let (status, upload_error) = match upload {
            Ok(()) => {
                self.writer.remove(&file);
                log::info!("Uploaded {} ({} rows, {} bytes)", remote_key, rows, file.bytes);
                (UploadStatus::Uploaded, None)
            }
            Err(e) => {
                log::warn!("Upload of {} failed, deferring: {}", remote_key, e);
                if let Err(err) = self.ledger.record(&file.local_name, &remote_key).await {
                    // Not queued, so nothing would ever retry it
                    self.writer.remove(&file);
                    return Err(err.into());
                }
                (UploadStatus::Deferred, Some(e.to_string()))
            }
        };

        // Stored for deferred files too
        let metadata_error = match metadata {
            Some(record) => match self.metadata.put(record).await {
                Ok(()) => None,
                Err(e) => {
                    log::warn!("Metadata for {} not stored: {}", remote_key, e);
                    Some(e.to_string())
                }
            },
            None => None,
        };

        Ok(UploadReceipt {
            remote_key,
            rows,
            bytes: file.bytes,
            status,
            upload_error,
            metadata_error,
        })
    }

    pub async fn retry_failed_uploads(&self) -> SdkResult<RetryReport> {
        Ok(self.ledger.retry_all().await?)
    }

    /// Drop every deferred upload and its local file
    pub async fn clear_failed_uploads(&self) -> SdkResult<usize> {
        Ok(self.ledger.clear().await?)
    }

    pub async fn pending_uploads(&self) -> SdkResult<Vec<LedgerEntry>> {
        Ok(self.ledger.entries().await?)
    }

    // ========================================================================
    // REMOTE FILES
    // ========================================================================

    /// Object keys stored for `user_id`, sorted
    pub async fn list_user_files(&self, user_id: &str) -> SdkResult<Vec<String>> {
        validate_user(user_id)?;
        let prefix = format!("{}/", user_id);
        let cancel = self.cancel.renew();
        let keys = guarded(self.config.timeout(), &cancel, self.transfer.list_by_prefix(&prefix)).await?;
        Ok(keys)
    }

    /// Delete every object stored for `user_id`. Keeps going past failures.
    pub async fn remove_user_files(&self, user_id: &str) -> SdkResult<RemovalReport> {
        let cancel = self.cancel.renew();
        let keys = self.list_user_files(user_id).await?;
        let mut report = RemovalReport::default();

        for key in keys {
            match guarded(self.config.timeout(), &cancel, self.transfer.delete(&key)).await {
                Ok(()) => report.removed.push(key),
                Err(e) => {
                    log::warn!("Could not delete {}: {}", key, e);
                    report.failed.push((key, e.to_string()));
                }
            }
        }

        log::info!(
            "Removed {} files for {} ({} failed)",
            report.removed.len(),
            user_id,
            report.failed.len()
        );
        Ok(report)
    }

    // ========================================================================
    // METADATA
    // ========================================================================

    pub async fn query_metadata(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> SdkResult<Vec<MetadataRecord>> {
        Ok(self.metadata.query(user_id, start, end).await?)
    }

    pub async fn remove_all_user_metadata(&self, user_id: &str) -> SdkResult<usize> {
        let removed = self.metadata.delete_all(user_id).await?;
        log::info!("Removed {} metadata records for {}", removed, user_id);
        Ok(removed)
    }

    // ========================================================================
    // MODELS
    // ========================================================================

    /// Controller sharing this SDK's transfer client and configuration
    pub fn model_controller<R: ModelRuntime>(
        &self,
        kind: ModelKind,
        num_features: usize,
        runtime: Arc<R>,
    ) -> SdkResult<ModelController<R>> {
        Ok(ModelController::new(kind, num_features, runtime, self.transfer.clone(), &self.config)?)
    }
}
