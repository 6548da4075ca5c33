//! Local metadata table (rusqlite)

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection};

use super::record::{sort_key, MetadataRecord};
use super::{validate_query, MetadataError, MetadataStore};
use crate::constants::{EVENT_DATE_KEY, USER_ID_KEY};

pub struct SqliteMetadataStore {
    conn: Mutex<Connection>,
    table: String,
}

impl SqliteMetadataStore {
    /// Open (or create) the database file at `path`
    pub fn open(path: &Path, table: &str) -> Result<Self, MetadataError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| MetadataError::Database(e.to_string()))?;
        }
        Self::with_connection(Connection::open(path)?, table)
    }

    pub fn in_memory(table: &str) -> Result<Self, MetadataError> {
        Self::with_connection(Connection::open_in_memory()?, table)
    }

    fn with_connection(conn: Connection, table: &str) -> Result<Self, MetadataError> {
        validate_table_name(table)?;
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS \"{table}\" (
                \"{uid}\" TEXT NOT NULL,
                \"{date}\" TEXT NOT NULL,
                fields TEXT NOT NULL,
                PRIMARY KEY (\"{uid}\", \"{date}\")
            )",
            table = table,
            uid = USER_ID_KEY,
            date = EVENT_DATE_KEY,
        );
        conn.execute(&sql, [])?;
        log::debug!("Metadata table '{}' ready", table);

        Ok(Self {
            conn: Mutex::new(conn),
            table: table.to_string(),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}

fn validate_table_name(table: &str) -> Result<(), MetadataError> {
    let ok = !table.is_empty()
        && table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if ok {
        Ok(())
    } else {
        Err(MetadataError::Validation(format!("invalid table name '{}'", table)))
    }
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    async fn put(&self, record: &MetadataRecord) -> Result<(), MetadataError> {
        let fields = serde_json::to_string(record.fields())?;
        let sql = format!(
            "INSERT OR REPLACE INTO \"{}\" (\"{}\", \"{}\", fields) VALUES (?1, ?2, ?3)",
            self.table, USER_ID_KEY, EVENT_DATE_KEY
        );
        self.conn
            .lock()
            .execute(&sql, params![record.user_id(), record.sort_key(), fields])?;
        Ok(())
    }

    async fn query(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<MetadataRecord>, MetadataError> {
        validate_query(user_id, &start, &end)?;

        let sql = format!(
            "SELECT \"{date}\", fields FROM \"{table}\"
             WHERE \"{uid}\" = ?1 AND \"{date}\" >= ?2 AND \"{date}\" <= ?3
             ORDER BY \"{date}\" ASC",
            table = self.table,
            uid = USER_ID_KEY,
            date = EVENT_DATE_KEY,
        );

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![user_id, sort_key(&start), sort_key(&end)], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (date, fields) = row?;
            let event_date = DateTime::parse_from_rfc3339(&date)
                .map_err(|e| MetadataError::Database(format!("bad {} '{}': {}", EVENT_DATE_KEY, date, e)))?
                .with_timezone(&Utc);
            let fields: BTreeMap<String, String> = serde_json::from_str(&fields)?;
            records.push(MetadataRecord::from_parts(user_id.to_string(), event_date, fields)?);
        }
        Ok(records)
    }

    async fn delete_all(&self, user_id: &str) -> Result<usize, MetadataError> {
        let sql = format!("DELETE FROM \"{}\" WHERE \"{}\" = ?1", self.table, USER_ID_KEY);
        let removed = self.conn.lock().execute(&sql, params![user_id])?;
        log::info!("Removed {} metadata records for {}", removed, user_id);
        Ok(removed)
    }
}
