//! REST Object Store Client
//!
//! HTTP client for an S3-style object endpoint:
//! - `PUT    {base}/{bucket}/{key}` upload
//! - `GET    {base}/{bucket}/{key}` download
//! - `GET    {base}/{bucket}?prefix=` list, JSON body `{"keys": [...]}`
//! - `DELETE {base}/{bucket}/{key}` delete

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;

use super::cancel::{guarded, CancelToken};
use super::{validate_key, TransferClient, TransferError};
use crate::constants::CSV_CONTENT_TYPE;
use crate::logic::config::SdkConfig;

#[derive(Debug, Deserialize)]
struct ListResponse {
    keys: Vec<String>,
}

/// Object storage client over reqwest
pub struct HttpTransferClient {
    base_url: String,
    bucket: String,
    timeout_secs: u64,
    cancel: CancelToken,
    http_client: reqwest::Client,
}

impl HttpTransferClient {
    /// Create new client from SDK configuration
    pub fn new(config: &SdkConfig) -> Result<Self, TransferError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| TransferError::Network(e.to_string()))?;

        Ok(Self {
            base_url: config.storage_url.trim_end_matches('/').to_string(),
            bucket: config.bucket.clone(),
            timeout_secs: config.timeout_secs,
            cancel: CancelToken::new(),
            http_client,
        })
    }

    /// Cancelling this token stops the calls in flight; later calls run normally
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    fn object_url(&self, key: &str) -> Result<String, TransferError> {
        validate_key(key)?;
        Ok(format!("{}/{}/{}", self.base_url, self.bucket, key))
    }

    async fn run<T, F>(&self, fut: F) -> Result<T, TransferError>
    where
        F: std::future::Future<Output = Result<T, TransferError>>,
    {
        let cancel = self.cancel.renew();
        guarded(std::time::Duration::from_secs(self.timeout_secs), &cancel, fut).await
    }
}

fn status_error(status: reqwest::StatusCode, key: &str) -> TransferError {
    if status == reqwest::StatusCode::NOT_FOUND {
        TransferError::NotFound(key.to_string())
    } else {
        TransferError::Server(status.as_u16())
    }
}

#[async_trait]
impl TransferClient for HttpTransferClient {
    async fn upload(&self, local_path: &Path, remote_key: &str) -> Result<(), TransferError> {
        let url = self.object_url(remote_key)?;
        let body = tokio::fs::read(local_path).await?;
        log::info!("Uploading {} ({} bytes)", remote_key, body.len());

        self.run(async {
            let response = self.http_client
                .put(&url)
                .header(reqwest::header::CONTENT_TYPE, CSV_CONTENT_TYPE)
                .body(body)
                .send()
                .await
                .map_err(|e| TransferError::Network(e.to_string()))?;

            if response.status().is_success() {
                Ok(())
            } else {
                let status = response.status();
                log::error!("Upload of {} failed ({})", remote_key, status);
                Err(status_error(status, remote_key))
            }
        })
        .await
    }

    async fn download(&self, remote_key: &str, local_path: &Path) -> Result<(), TransferError> {
        let url = self.object_url(remote_key)?;

        let bytes = self.run(async {
            let response = self.http_client
                .get(&url)
                .send()
                .await
                .map_err(|e| TransferError::Network(e.to_string()))?;

            if !response.status().is_success() {
                return Err(status_error(response.status(), remote_key));
            }
            response.bytes().await
                .map_err(|e| TransferError::Network(e.to_string()))
        })
        .await?;

        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(local_path, &bytes).await?;
        log::info!("Downloaded {} ({} bytes)", remote_key, bytes.len());
        Ok(())
    }

    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<String>, TransferError> {
        let url = format!("{}/{}", self.base_url, self.bucket);

        self.run(async {
            let response = self.http_client
                .get(&url)
                .query(&[("prefix", prefix)])
                .send()
                .await
                .map_err(|e| TransferError::Network(e.to_string()))?;

            if !response.status().is_success() {
                return Err(TransferError::Server(response.status().as_u16()));
            }
            let listed: ListResponse = response.json().await
                .map_err(|e| TransferError::Parse(e.to_string()))?;
            let mut keys = listed.keys;
            keys.sort();
            Ok(keys)
        })
        .await
    }

    async fn delete(&self, remote_key: &str) -> Result<(), TransferError> {
        let url = self.object_url(remote_key)?;

        self.run(async {
            let response = self.http_client
                .delete(&url)
                .send()
                .await
                .map_err(|e| TransferError::Network(e.to_string()))?;

            if response.status().is_success() {
                Ok(())
            } else {
                Err(status_error(response.status(), remote_key))
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_url_layout() {
        let mut cfg = SdkConfig::with_data_dir("/tmp/unused");
        cfg.storage_url = "http://storage.local/".to_string();
        cfg.bucket = "trials".to_string();
        let client = HttpTransferClient::new(&cfg).unwrap();

        assert_eq!(
            client.object_url("u1/a.csv").unwrap(),
            "http://storage.local/trials/u1/a.csv"
        );
        assert!(client.object_url("../escape").is_err());
    }
}
