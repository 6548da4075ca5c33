use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;
use tokio::sync::Notify;

use super::storage::{load_sequence, save_sequence, temp_path};
use super::{LedgerEntry, LedgerError, UploadLedger};
use crate::logic::config::SdkConfig;
use crate::logic::transfer::{FsTransferClient, TransferClient, TransferError};

/// Filesystem store that refuses selected keys and can hang uploads
struct FlakyTransfer {
    inner: FsTransferClient,
    failing: Mutex<HashSet<String>>,
    uploads: AtomicUsize,
    stall: AtomicBool,
    stalled: Notify,
}

impl FlakyTransfer {
    fn new(root: &Path) -> Self {
        Self {
            inner: FsTransferClient::new(root),
            failing: Mutex::new(HashSet::new()),
            uploads: AtomicUsize::new(0),
            stall: AtomicBool::new(false),
            stalled: Notify::new(),
        }
    }

    fn fail(&self, key: &str) {
        self.failing.lock().insert(key.to_string());
    }
}

#[async_trait]
impl TransferClient for FlakyTransfer {
    async fn upload(&self, local_path: &Path, remote_key: &str) -> Result<(), TransferError> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        if self.stall.load(Ordering::SeqCst) {
            self.stalled.notify_one();
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
        if self.failing.lock().contains(remote_key) {
            return Err(TransferError::Server(503));
        }
        self.inner.upload(local_path, remote_key).await
    }

    async fn download(&self, remote_key: &str, local_path: &Path) -> Result<(), TransferError> {
        self.inner.download(remote_key, local_path).await
    }

    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<String>, TransferError> {
        self.inner.list_by_prefix(prefix).await
    }

    async fn delete(&self, remote_key: &str) -> Result<(), TransferError> {
        self.inner.delete(remote_key).await
    }
}

struct Fixture {
    _work: TempDir,
    store: TempDir,
    config: SdkConfig,
    transfer: Arc<FlakyTransfer>,
    ledger: Arc<UploadLedger>,
}

impl Fixture {
    fn new() -> Self {
        let work = TempDir::new().unwrap();
        let store = TempDir::new().unwrap();
        let config = SdkConfig::with_data_dir(work.path());
        let transfer = Arc::new(FlakyTransfer::new(store.path()));
        let ledger = Arc::new(UploadLedger::new(&config, transfer.clone()));
        Self {
            _work: work,
            store,
            config,
            transfer,
            ledger,
        }
    }

    /// Create a pending CSV file in the upload directory
    fn artifact(&self, name: &str) -> String {
        let path = self.config.upload_dir().join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, format!("{}\n", name)).unwrap();
        name.to_string()
    }

    fn sequence_lengths(&self) -> (usize, usize) {
        let local = load_sequence(&self.config.ledger_local_path()).unwrap().unwrap_or_default();
        let remote = load_sequence(&self.config.ledger_remote_path()).unwrap().unwrap_or_default();
        (local.len(), remote.len())
    }
}

// ============================================================================
// STORAGE FORMAT
// ============================================================================

#[test]
fn test_sequence_round_trip_preserves_order() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("seq.json");
    let items: Vec<String> = vec![
        "b.csv".into(),
        "a,with,commas.csv".into(),
        "".into(),
        "ünïcödé/β.csv".into(),
        "b.csv".into(),
    ];

    save_sequence(&path, &items).unwrap();
    assert_eq!(load_sequence(&path).unwrap(), Some(items));
}

#[test]
fn test_missing_sequence_reads_as_none() {
    let dir = TempDir::new().unwrap();
    assert_eq!(load_sequence(&dir.path().join("absent.json")).unwrap(), None);
}

#[test]
fn test_tampered_sequence_is_corruption() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("seq.json");
    save_sequence(&path, &["one.csv".to_string()]).unwrap();

    let text = std::fs::read_to_string(&path).unwrap().replace("one.csv", "two.csv");
    std::fs::write(&path, text).unwrap();

    assert!(matches!(load_sequence(&path), Err(LedgerError::Corrupted(_))));
}

// ============================================================================
// RECORD / RETRY / CLEAR
// ============================================================================

#[tokio::test]
async fn test_record_appends_in_order() {
    let fx = Fixture::new();
    fx.ledger.record(&fx.artifact("a.csv"), "u1/a.csv").await.unwrap();
    fx.ledger.record(&fx.artifact("b.csv"), "u1/b.csv").await.unwrap();

    assert_eq!(
        fx.ledger.entries().await.unwrap(),
        vec![LedgerEntry::new("a.csv", "u1/a.csv"), LedgerEntry::new("b.csv", "u1/b.csv")]
    );
    assert_eq!(fx.sequence_lengths(), (2, 2));
}

#[tokio::test]
async fn test_retry_on_empty_ledger_attempts_nothing() {
    let fx = Fixture::new();
    let err = fx.ledger.retry_all().await.unwrap_err();
    assert!(matches!(err, LedgerError::NothingToRetry));
    assert_eq!(fx.transfer.uploads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_retry_keeps_failures_in_order() {
    let fx = Fixture::new();
    for name in ["one.csv", "two.csv", "three.csv"] {
        let local = fx.artifact(name);
        fx.ledger.record(&local, &format!("u1/{}", name)).await.unwrap();
    }
    fx.transfer.fail("u1/one.csv");
    fx.transfer.fail("u1/three.csv");

    let report = fx.ledger.retry_all().await.unwrap();

    assert_eq!(report.uploaded, vec![LedgerEntry::new("two.csv", "u1/two.csv")]);
    assert_eq!(
        report.pending,
        vec![LedgerEntry::new("one.csv", "u1/one.csv"), LedgerEntry::new("three.csv", "u1/three.csv")]
    );
    assert_eq!(fx.ledger.entries().await.unwrap(), report.pending);

    // Uploaded file is gone locally and present remotely; failures stay on disk
    assert!(!fx.config.upload_dir().join("two.csv").exists());
    assert!(fx.store.path().join("u1/two.csv").exists());
    assert!(fx.config.upload_dir().join("one.csv").exists());
    assert_eq!(fx.transfer.uploads.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_retry_drains_ledger_when_all_succeed() {
    let fx = Fixture::new();
    fx.ledger.record(&fx.artifact("a.csv"), "u1/a.csv").await.unwrap();

    let report = fx.ledger.retry_all().await.unwrap();
    assert_eq!(report.uploaded.len(), 1);
    assert!(fx.ledger.is_empty().await.unwrap());
    assert!(matches!(fx.ledger.retry_all().await, Err(LedgerError::NothingToRetry)));
}

#[tokio::test]
async fn test_record_on_mismatched_ledger_resets_and_discards_artifact() {
    let fx = Fixture::new();
    save_sequence(&fx.config.ledger_local_path(), &["x.csv".into(), "y.csv".into()]).unwrap();
    save_sequence(&fx.config.ledger_remote_path(), &["u1/x.csv".into()]).unwrap();

    let local = fx.artifact("fresh.csv");
    let err = fx.ledger.record(&local, "u1/fresh.csv").await.unwrap_err();

    assert!(matches!(err, LedgerError::Corrupted(_)));
    assert!(fx.ledger.entries().await.unwrap().is_empty());
    assert_eq!(fx.sequence_lengths(), (0, 0));
    assert!(!fx.config.upload_dir().join("fresh.csv").exists());
}

#[tokio::test]
async fn test_retry_on_half_missing_ledger_resets() {
    let fx = Fixture::new();
    save_sequence(&fx.config.ledger_local_path(), &["x.csv".into()]).unwrap();

    let err = fx.ledger.retry_all().await.unwrap_err();
    assert!(matches!(err, LedgerError::Corrupted(_)));
    assert_eq!(fx.transfer.uploads.load(Ordering::SeqCst), 0);
    assert_eq!(fx.sequence_lengths(), (0, 0));
}

#[tokio::test]
async fn test_clear_removes_files_and_entries() {
    let fx = Fixture::new();
    fx.ledger.record(&fx.artifact("a.csv"), "u1/a.csv").await.unwrap();
    fx.ledger.record(&fx.artifact("sub/b.csv"), "u1/b.csv").await.unwrap();

    assert_eq!(fx.ledger.clear().await.unwrap(), 2);
    assert!(fx.ledger.is_empty().await.unwrap());
    assert!(!fx.config.upload_dir().join("a.csv").exists());
    assert!(!fx.config.upload_dir().join("sub/b.csv").exists());
}

#[tokio::test]
async fn test_rejects_escaping_local_names() {
    let fx = Fixture::new();
    for bad in ["", "../evil.csv", "/abs.csv"] {
        let err = fx.ledger.record(bad, "u1/x.csv").await.unwrap_err();
        assert!(matches!(err, LedgerError::InvalidEntry(_)), "accepted {:?}", bad);
    }
    assert!(fx.ledger.entries().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_record_and_retry_keep_sequences_equal() {
    let fx = Fixture::new();
    fx.transfer.fail("u1/f3.csv");
    fx.transfer.fail("u1/f7.csv");

    let mut tasks = Vec::new();
    for i in 0..16 {
        let ledger = Arc::clone(&fx.ledger);
        let local = fx.artifact(&format!("f{}.csv", i));
        tasks.push(tokio::spawn(async move {
            ledger.record(&local, &format!("u1/f{}.csv", i)).await.unwrap();
            if i % 4 == 0 {
                let _ = ledger.retry_all().await;
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let (local, remote) = fx.sequence_lengths();
    assert_eq!(local, remote);

    // A final pass leaves exactly the two refused uploads
    let _ = fx.ledger.retry_all().await;
    let pending: Vec<String> = fx
        .ledger
        .entries()
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.remote_name)
        .collect();
    let mut sorted = pending.clone();
    sorted.sort();
    assert_eq!(sorted, vec!["u1/f3.csv".to_string(), "u1/f7.csv".to_string()]);
}

#[tokio::test]
async fn test_cancelled_pass_leaves_later_passes_working() {
    let fx = Fixture::new();
    fx.ledger.record(&fx.artifact("a.csv"), "u1/a.csv").await.unwrap();
    fx.transfer.stall.store(true, Ordering::SeqCst);

    let ledger = Arc::clone(&fx.ledger);
    let pass = tokio::spawn(async move { ledger.retry_all().await });
    fx.transfer.stalled.notified().await;
    fx.ledger.cancel_token().cancel();

    let report = pass.await.unwrap().unwrap();
    assert!(report.uploaded.is_empty());
    assert_eq!(report.pending, vec![LedgerEntry::new("a.csv", "u1/a.csv")]);

    fx.transfer.stall.store(false, Ordering::SeqCst);
    let report = fx.ledger.retry_all().await.unwrap();
    assert_eq!(report.uploaded, vec![LedgerEntry::new("a.csv", "u1/a.csv")]);
    assert!(fx.store.path().join("u1/a.csv").exists());
    assert!(fx.ledger.is_empty().await.unwrap());
}

#[tokio::test]
async fn test_failed_write_keeps_previous_pair() {
    let fx = Fixture::new();
    fx.ledger.record(&fx.artifact("a.csv"), "u1/a.csv").await.unwrap();

    // A directory squatting on the remote staging path makes the second stage fail
    let blocker = temp_path(&fx.config.ledger_remote_path());
    std::fs::create_dir_all(&blocker).unwrap();

    let err = fx.ledger.record(&fx.artifact("b.csv"), "u1/b.csv").await.unwrap_err();
    assert!(matches!(err, LedgerError::Io(_)));
    assert!(!temp_path(&fx.config.ledger_local_path()).exists());

    std::fs::remove_dir(&blocker).unwrap();
    assert_eq!(fx.sequence_lengths(), (1, 1));
    assert_eq!(
        fx.ledger.entries().await.unwrap(),
        vec![LedgerEntry::new("a.csv", "u1/a.csv")]
    );
}
