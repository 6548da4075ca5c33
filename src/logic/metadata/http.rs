//! Managed document store over REST
//!
//! - `PUT    {base}/tables/{table}/items` body: record JSON
//! - `GET    {base}/tables/{table}/items?userID=&from=&to=` -> `{"items": [...]}`
//! - `DELETE {base}/tables/{table}/items?userID=` -> `{"deleted": n}`

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::record::{sort_key, MetadataRecord};
use super::{validate_query, MetadataError, MetadataStore};
use crate::constants::USER_ID_KEY;
use crate::logic::config::SdkConfig;

#[derive(Debug, Deserialize)]
struct QueryResponse {
    items: Vec<MetadataRecord>,
}

#[derive(Debug, Deserialize)]
struct DeleteResponse {
    deleted: usize,
}

pub struct HttpMetadataStore {
    items_url: String,
    http_client: reqwest::Client,
}

impl HttpMetadataStore {
    /// Table name comes from configuration, never from global state
    pub fn new(config: &SdkConfig) -> Result<Self, MetadataError> {
        if config.metadata_table.is_empty() {
            return Err(MetadataError::Validation("metadata table name is empty".to_string()));
        }
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| MetadataError::Network(e.to_string()))?;

        Ok(Self {
            items_url: format!(
                "{}/tables/{}/items",
                config.metadata_url.trim_end_matches('/'),
                config.metadata_table
            ),
            http_client,
        })
    }

    pub fn items_url(&self) -> &str {
        &self.items_url
    }
}

/// Query parameters for a range read
pub(crate) fn range_params(user_id: &str, start: &DateTime<Utc>, end: &DateTime<Utc>) -> Vec<(&'static str, String)> {
    vec![
        (USER_ID_KEY, user_id.to_string()),
        ("from", sort_key(start)),
        ("to", sort_key(end)),
    ]
}

/// Parse a query body; every record is validated and must belong to `user_id`
pub(crate) fn decode_items(user_id: &str, body: &[u8]) -> Result<Vec<MetadataRecord>, MetadataError> {
    let body: QueryResponse = serde_json::from_slice(body)?;
    if let Some(stray) = body.items.iter().find(|r| r.user_id() != user_id) {
        return Err(MetadataError::Validation(format!(
            "query for '{}' returned a record of '{}'",
            user_id,
            stray.user_id()
        )));
    }
    let mut items = body.items;
    items.sort_by_key(|r| r.event_date());
    Ok(items)
}

fn network(e: reqwest::Error) -> MetadataError {
    MetadataError::Network(e.to_string())
}

#[async_trait]
impl MetadataStore for HttpMetadataStore {
    async fn put(&self, record: &MetadataRecord) -> Result<(), MetadataError> {
        let response = self.http_client
            .put(&self.items_url)
            .json(record)
            .send()
            .await
            .map_err(network)?;

        if response.status().is_success() {
            log::debug!("Metadata saved for {} at {}", record.user_id(), record.sort_key());
            Ok(())
        } else {
            Err(MetadataError::Server(response.status().as_u16()))
        }
    }

    async fn query(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<MetadataRecord>, MetadataError> {
        validate_query(user_id, &start, &end)?;

        let response = self.http_client
            .get(&self.items_url)
            .query(&range_params(user_id, &start, &end))
            .send()
            .await
            .map_err(network)?;

        if !response.status().is_success() {
            return Err(MetadataError::Server(response.status().as_u16()));
        }
        let bytes = response.bytes().await.map_err(network)?;
        decode_items(user_id, &bytes)
    }

    async fn delete_all(&self, user_id: &str) -> Result<usize, MetadataError> {
        let response = self.http_client
            .delete(&self.items_url)
            .query(&[(USER_ID_KEY, user_id)])
            .send()
            .await
            .map_err(network)?;

        if !response.status().is_success() {
            return Err(MetadataError::Server(response.status().as_u16()));
        }
        let body: DeleteResponse = response.json().await.map_err(network)?;
        log::info!("Removed {} metadata records for {}", body.deleted, user_id);
        Ok(body.deleted)
    }
}
