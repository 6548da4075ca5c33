//! Versioned on-disk format for one ledger sequence
//!
//! `{"version": 1, "items": [...], "crc32": n}` written via temp file + rename.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::LedgerError;

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct SequenceFile {
    version: u32,
    items: Vec<String>,
    crc32: u32,
}

/// CRC over length-prefixed items so ["ab"] and ["a","b"] differ
fn checksum(items: &[String]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    for item in items {
        hasher.update(&(item.len() as u64).to_le_bytes());
        hasher.update(item.as_bytes());
    }
    hasher.finalize()
}

pub(crate) fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write `items` to `path`, replacing any previous content
pub fn save_sequence(path: &Path, items: &[String]) -> Result<(), LedgerError> {
    let staged = stage_sequence(path, items)?;
    commit_sequence(&staged, path)
}

/// Write `items` next to `path` without replacing it. Returns the staged file.
pub fn stage_sequence(path: &Path, items: &[String]) -> Result<PathBuf, LedgerError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let file = SequenceFile {
        version: FORMAT_VERSION,
        items: items.to_vec(),
        crc32: checksum(items),
    };
    let json = serde_json::to_vec_pretty(&file)?;

    let tmp = temp_path(path);
    fs::write(&tmp, json)?;
    Ok(tmp)
}

/// Move a staged file over `path`
pub fn commit_sequence(staged: &Path, path: &Path) -> Result<(), LedgerError> {
    fs::rename(staged, path)?;
    Ok(())
}

/// Drop a staged file that will not be committed
pub fn discard_staged(staged: &Path) {
    if let Err(e) = fs::remove_file(staged) {
        if e.kind() != std::io::ErrorKind::NotFound {
            log::warn!("Could not remove staged ledger file {:?}: {}", staged, e);
        }
    }
}

/// Read a sequence back. `Ok(None)` when the file does not exist.
pub fn load_sequence(path: &Path) -> Result<Option<Vec<String>>, LedgerError> {
    if !path.exists() {
        return Ok(None);
    }

    let data = fs::read(path)?;
    let file: SequenceFile = serde_json::from_slice(&data)
        .map_err(|e| LedgerError::Corrupted(format!("{:?} unreadable: {}", path, e)))?;

    if file.version != FORMAT_VERSION {
        return Err(LedgerError::Corrupted(format!(
            "{:?} has format v{}, expected v{}",
            path, file.version, FORMAT_VERSION
        )));
    }
    if checksum(&file.items) != file.crc32 {
        return Err(LedgerError::Corrupted(format!("{:?} failed checksum", path)));
    }

    Ok(Some(file.items))
}
