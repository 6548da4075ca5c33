use chrono::{TimeZone, Utc};
use tempfile::tempdir;

use super::writer::validate_user;
use super::{CsvWriter, DataFormatter, FormatError};

fn sample() -> (Vec<Vec<f64>>, Vec<Vec<f64>>) {
    (
        vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]],
        vec![vec![7.0], vec![8.0], vec![9.0]],
    )
}

#[test]
fn test_rows_interleave_channels_then_labels() {
    let (features, labels) = sample();
    let formatter = DataFormatter::new(2, 1);

    let (rows, text) = formatter.format(Some(&features), Some(&labels), None).unwrap();

    assert_eq!(rows, 3);
    assert_eq!(text, "1,4,7\n2,5,8\n3,6,9\n");
}

#[test]
fn test_fractional_values_use_natural_decimal_text() {
    let formatter = DataFormatter::new(1, 2);
    let features = vec![vec![0.25, -1.5]];
    let labels = vec![vec![0.1, 10.0], vec![3.0, 0.0]];

    let (_, text) = formatter.format(Some(&features), Some(&labels), None).unwrap();
    assert_eq!(text, "0.25,0.1,10\n-1.5,3,0\n");
}

#[test]
fn test_timestamps_lead_each_row() {
    let formatter = DataFormatter::new(1, 1);
    let features = vec![vec![1.0, 2.0]];
    let labels = vec![vec![0.0], vec![1.0]];
    let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    let stamps = vec![t0, t0 + chrono::Duration::milliseconds(20)];

    let (_, text) = formatter.format(Some(&features), Some(&labels), Some(&stamps)).unwrap();
    assert_eq!(
        text,
        "2024-03-01T12:00:00.000Z,1,0\n2024-03-01T12:00:00.020Z,2,1\n"
    );
}

#[test]
fn test_missing_series_rejected() {
    let (features, labels) = sample();
    let formatter = DataFormatter::new(2, 1);

    assert!(matches!(
        formatter.format(None, Some(&labels), None),
        Err(FormatError::MissingFeatures)
    ));
    assert!(matches!(
        formatter.format(Some(&features), None, None),
        Err(FormatError::MissingLabels)
    ));
}

#[test]
fn test_shape_violations_rejected() {
    let (features, labels) = sample();

    let err = DataFormatter::new(3, 1).format(Some(&features), Some(&labels), None).unwrap_err();
    assert!(matches!(err, FormatError::FeatureCountMismatch { expected: 3, actual: 2 }));

    let ragged = vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0]];
    let err = DataFormatter::new(2, 1).format(Some(&ragged), Some(&labels), None).unwrap_err();
    assert!(matches!(err, FormatError::RaggedFeatures { channel: 1, .. }));

    let short_labels = vec![vec![7.0], vec![8.0]];
    let err = DataFormatter::new(2, 1).format(Some(&features), Some(&short_labels), None).unwrap_err();
    assert!(matches!(err, FormatError::LabelCountMismatch { expected: 3, actual: 2 }));

    let wide_labels = vec![vec![7.0], vec![8.0, 0.0], vec![9.0]];
    let err = DataFormatter::new(2, 1).format(Some(&features), Some(&wide_labels), None).unwrap_err();
    assert!(matches!(err, FormatError::LabelWidthMismatch { row: 1, .. }));

    let stamps = vec![Utc::now()];
    let err = DataFormatter::new(2, 1)
        .format(Some(&features), Some(&labels), Some(&stamps))
        .unwrap_err();
    assert!(matches!(err, FormatError::TimestampCountMismatch { expected: 3, actual: 1 }));
}

#[test]
fn test_empty_and_non_finite_rejected() {
    let formatter = DataFormatter::new(1, 1);

    let empty: Vec<Vec<f64>> = vec![vec![]];
    let err = formatter.format(Some(&empty), Some(&[]), None).unwrap_err();
    assert!(matches!(err, FormatError::EmptySeries));

    let features = vec![vec![1.0, f64::NAN]];
    let labels = vec![vec![0.0], vec![0.0]];
    let err = formatter.format(Some(&features), Some(&labels), None).unwrap_err();
    assert!(matches!(err, FormatError::NonFinite { row: 1, column: 0 }));
}

#[test]
fn test_writer_creates_user_scoped_file() {
    let dir = tempdir().unwrap();
    let writer = CsvWriter::new(dir.path());

    let file = writer.write("alice", "1,4,7\n").unwrap();

    assert!(file.local_name.starts_with("alice/alice_"));
    assert!(file.local_name.ends_with(".csv"));
    assert_eq!(file.path, dir.path().join(&file.local_name));
    assert_eq!(file.bytes, 6);
    assert_eq!(std::fs::read_to_string(&file.path).unwrap(), "1,4,7\n");

    // No temp files left behind
    let names: Vec<_> = std::fs::read_dir(dir.path().join("alice"))
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(names.len(), 1);
}

#[test]
fn test_writer_names_are_unique_within_a_second() {
    let dir = tempdir().unwrap();
    let writer = CsvWriter::new(dir.path());

    let a = writer.write("bob", "x\n").unwrap();
    let b = writer.write("bob", "y\n").unwrap();
    assert_ne!(a.local_name, b.local_name);

    writer.remove(&a);
    assert!(!a.path.exists());
    assert!(b.path.exists());
    // Removing twice is harmless
    writer.remove(&a);
}

#[test]
fn test_user_ids_that_escape_are_rejected() {
    for bad in ["", ".", "..", "a/b", "a\\b", "tab\tuser"] {
        assert!(validate_user(bad).is_err(), "accepted {:?}", bad);
    }
    assert!(validate_user("user-42@example.com").is_ok());

    let dir = tempdir().unwrap();
    let err = CsvWriter::new(dir.path()).write("../up", "x\n").unwrap_err();
    assert!(matches!(err, FormatError::InvalidUser(_)));
}
