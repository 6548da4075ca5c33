use chrono::{Duration, TimeZone, Utc};

use super::http::{decode_items, range_params, HttpMetadataStore};
use super::record::MetadataRecord;
use super::sqlite::SqliteMetadataStore;
use super::{MetadataError, MetadataStore};
use crate::constants::USER_ID_KEY;
use crate::logic::config::SdkConfig;

fn day(d: u32) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, d, 12, 0, 0).unwrap()
}

#[test]
fn test_record_rejects_empty_user() {
    assert!(matches!(
        MetadataRecord::new("  ", day(1)),
        Err(MetadataError::Validation(_))
    ));
}

#[test]
fn test_record_field_bounds() {
    let mut record = MetadataRecord::new("u1", day(1)).unwrap();
    for i in 0..10 {
        record = record.with_field(format!("f{}", i), i).unwrap();
    }
    // Overwriting an existing field is fine at the limit
    record = record.with_field("f3", "again").unwrap();
    assert_eq!(record.field("f3"), Some("again"));

    let err = record.clone().with_field("f10", 1).unwrap_err();
    assert!(matches!(err, MetadataError::Validation(_)));

    let err = MetadataRecord::new("u1", day(1)).unwrap().with_field(USER_ID_KEY, "x").unwrap_err();
    assert!(matches!(err, MetadataError::Validation(_)));
}

#[test]
fn test_record_json_uses_canonical_keys() {
    let record = MetadataRecord::new("u1", day(1)).unwrap().with_field("device", "watch").unwrap();
    let json = serde_json::to_value(&record).unwrap();
    assert_eq!(json["userID"], "u1");
    assert!(json.get("eventDate").is_some());
    assert!(json.get("userId").is_none());
}

#[test]
fn test_http_queries_use_canonical_user_key() {
    let params = range_params("u1", &day(1), &day(2));
    assert_eq!(params[0].0, "userID");
    assert_eq!(params[0].1, "u1");

    let mut cfg = SdkConfig::with_data_dir("/tmp/unused");
    cfg.metadata_url = "http://db.local/".to_string();
    cfg.metadata_table = "Trials".to_string();
    let store = HttpMetadataStore::new(&cfg).unwrap();
    assert_eq!(store.items_url(), "http://db.local/tables/Trials/items");
}

#[tokio::test]
async fn test_sqlite_put_query_range() {
    let store = SqliteMetadataStore::in_memory("SensorMetadata").unwrap();
    for d in 1..=5 {
        let record = MetadataRecord::new("u1", day(d)).unwrap().with_field("trial", d).unwrap();
        store.put(&record).await.unwrap();
    }
    store.put(&MetadataRecord::new("u2", day(3)).unwrap()).await.unwrap();

    let hits = store.query("u1", day(2), day(4)).await.unwrap();
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].event_date(), day(2));
    assert_eq!(hits[2].field("trial"), Some("4"));
    assert!(hits.iter().all(|r| r.user_id() == "u1"));
}

#[tokio::test]
async fn test_sqlite_rejects_inverted_range() {
    let store = SqliteMetadataStore::in_memory("SensorMetadata").unwrap();
    let err = store.query("u1", day(4), day(4) - Duration::days(1)).await.unwrap_err();
    assert!(matches!(err, MetadataError::Validation(_)));
}

#[tokio::test]
async fn test_sqlite_delete_all_only_touches_user() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteMetadataStore::open(&dir.path().join("meta.db"), "SensorMetadata").unwrap();
    store.put(&MetadataRecord::new("u1", day(1)).unwrap()).await.unwrap();
    store.put(&MetadataRecord::new("u1", day(2)).unwrap()).await.unwrap();
    store.put(&MetadataRecord::new("u2", day(1)).unwrap()).await.unwrap();

    assert_eq!(store.delete_all("u1").await.unwrap(), 2);
    assert!(store.query("u1", day(1), day(9)).await.unwrap().is_empty());
    assert_eq!(store.query("u2", day(1), day(9)).await.unwrap().len(), 1);
}

#[test]
fn test_sqlite_rejects_bad_table_name() {
    assert!(SqliteMetadataStore::in_memory("x\"; DROP").is_err());
}

#[test]
fn test_deserialize_applies_record_checks() {
    let fields: Vec<String> = (0..11).map(|i| format!("\"f{}\": \"{}\"", i, i)).collect();
    let too_many = format!(
        r#"{{"userID": "u1", "eventDate": "2024-03-01T12:00:00Z", "fields": {{{}}}}}"#,
        fields.join(", ")
    );
    assert!(serde_json::from_str::<MetadataRecord>(&too_many).is_err());

    let empty_user = r#"{"userID": "", "eventDate": "2024-03-01T12:00:00Z"}"#;
    assert!(serde_json::from_str::<MetadataRecord>(empty_user).is_err());

    let reserved = r#"{"userID": "u1", "eventDate": "2024-03-01T12:00:00Z", "fields": {"eventDate": "x"}}"#;
    assert!(serde_json::from_str::<MetadataRecord>(reserved).is_err());

    let record = MetadataRecord::new("u1", day(1)).unwrap().with_field("steps", 42).unwrap();
    let json = serde_json::to_string(&record).unwrap();
    assert_eq!(serde_json::from_str::<MetadataRecord>(&json).unwrap(), record);
}

#[test]
fn test_http_query_body_is_validated() {
    let ok = br#"{"items": [
        {"userID": "u1", "eventDate": "2024-03-02T00:00:00Z"},
        {"userID": "u1", "eventDate": "2024-03-01T00:00:00Z", "fields": {"a": "1"}}
    ]}"#;
    let items = decode_items("u1", ok).unwrap();
    assert_eq!(items.len(), 2);
    assert!(items[0].event_date() < items[1].event_date());

    let stray = br#"{"items": [{"userID": "u2", "eventDate": "2024-03-01T00:00:00Z"}]}"#;
    assert!(matches!(decode_items("u1", stray), Err(MetadataError::Validation(_))));

    let bad = br#"{"items": [{"userID": "", "eventDate": "2024-03-01T00:00:00Z"}]}"#;
    assert!(matches!(decode_items("u1", bad), Err(MetadataError::Serialization(_))));
}

#[tokio::test]
async fn test_sqlite_keeps_sub_millisecond_dates_apart() {
    let store = SqliteMetadataStore::in_memory("SensorMetadata").unwrap();
    let t0 = day(1) + Duration::nanoseconds(123_456_789);
    let t1 = t0 + Duration::microseconds(300);

    store.put(&MetadataRecord::new("u1", t0).unwrap().with_field("n", 0).unwrap()).await.unwrap();
    store.put(&MetadataRecord::new("u1", t1).unwrap().with_field("n", 1).unwrap()).await.unwrap();

    let found = store.query("u1", day(1), day(2)).await.unwrap();
    assert_eq!(found.len(), 2);
    assert_eq!(found[0].event_date(), t0);
    assert_eq!(found[1].event_date(), t1);
    assert_eq!(found[1].field("n"), Some("1"));
}
