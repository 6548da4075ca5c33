use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::MetadataError;
use crate::constants::{EVENT_DATE_KEY, MAX_METADATA_FIELDS, USER_ID_KEY};

/// One metadata row keyed by (userID, eventDate).
///
/// Deserialization goes through the same checks as `new` + `with_field`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(try_from = "RawMetadataRecord")]
pub struct MetadataRecord {
    #[serde(rename = "userID")]
    user_id: String,
    #[serde(rename = "eventDate")]
    event_date: DateTime<Utc>,
    #[serde(default)]
    fields: BTreeMap<String, String>,
}

impl MetadataRecord {
    pub fn new(user_id: impl Into<String>, event_date: DateTime<Utc>) -> Result<Self, MetadataError> {
        let user_id = user_id.into();
        if user_id.trim().is_empty() {
            return Err(MetadataError::Validation("userID must not be empty".to_string()));
        }
        Ok(Self {
            user_id,
            event_date,
            fields: BTreeMap::new(),
        })
    }

    /// Attach an optional named field
    pub fn with_field(mut self, name: impl Into<String>, value: impl ToString) -> Result<Self, MetadataError> {
        let name = name.into();
        if name.is_empty() {
            return Err(MetadataError::Validation("field name must not be empty".to_string()));
        }
        if name == USER_ID_KEY || name == EVENT_DATE_KEY {
            return Err(MetadataError::Validation(format!("'{}' is a reserved key", name)));
        }
        if !self.fields.contains_key(&name) && self.fields.len() >= MAX_METADATA_FIELDS {
            return Err(MetadataError::Validation(format!(
                "at most {} optional fields allowed",
                MAX_METADATA_FIELDS
            )));
        }
        self.fields.insert(name, value.to_string());
        Ok(self)
    }

    /// Rebuild a stored record, re-validating every field
    pub(crate) fn from_parts(
        user_id: String,
        event_date: DateTime<Utc>,
        fields: BTreeMap<String, String>,
    ) -> Result<Self, MetadataError> {
        fields
            .into_iter()
            .try_fold(Self::new(user_id, event_date)?, |record, (name, value)| {
                record.with_field(name, value)
            })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn event_date(&self) -> DateTime<Utc> {
        self.event_date
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    /// Sort key text; fixed width so lexical order matches time order
    pub fn sort_key(&self) -> String {
        sort_key(&self.event_date)
    }
}

/// Nanosecond precision, so distinct instants never share a key
pub(crate) fn sort_key(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Wire shape before validation
#[derive(Deserialize)]
struct RawMetadataRecord {
    #[serde(rename = "userID")]
    user_id: String,
    #[serde(rename = "eventDate")]
    event_date: DateTime<Utc>,
    #[serde(default)]
    fields: BTreeMap<String, String>,
}

impl TryFrom<RawMetadataRecord> for MetadataRecord {
    type Error = MetadataError;

    fn try_from(raw: RawMetadataRecord) -> Result<Self, Self::Error> {
        MetadataRecord::from_parts(raw.user_id, raw.event_date, raw.fields)
    }
}
