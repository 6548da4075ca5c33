use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;

use super::FormatError;

/// A CSV file written into the upload directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvFile {
    /// Full path on disk
    pub path: PathBuf,
    /// `"{user}/{file}"`, relative to the upload directory; also the remote key
    pub local_name: String,
    pub bytes: usize,
}

/// Writes user-scoped CSV files under one base directory
pub struct CsvWriter {
    base_dir: PathBuf,
}

impl CsvWriter {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Write `content` to `{base}/{user}/{user}_{YYYY-MM-DD-HHMMSS}_{id}.csv`.
    /// The file appears complete or not at all.
    pub fn write(&self, user_id: &str, content: &str) -> Result<CsvFile, FormatError> {
        validate_user(user_id)?;

        let dir = self.base_dir.join(user_id);
        fs::create_dir_all(&dir)?;

        let file_name = Self::file_name(user_id);
        let path = dir.join(&file_name);
        let tmp = dir.join(format!(".{}.tmp", file_name));

        fs::write(&tmp, content)?;
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }

        log::debug!("Wrote {} bytes to {:?}", content.len(), path);
        Ok(CsvFile {
            path,
            local_name: format!("{}/{}", user_id, file_name),
            bytes: content.len(),
        })
    }

    /// Remove a file previously returned by `write`
    pub fn remove(&self, file: &CsvFile) {
        match fs::remove_file(&file.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("Could not remove {:?}: {}", file.path, e),
        }
    }

    fn file_name(user_id: &str) -> String {
        let now = Utc::now();
        // Second resolution alone collides on bursts
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        format!("{}_{}_{}.csv", user_id, now.format("%Y-%m-%d-%H%M%S"), &suffix[..8])
    }
}

/// User ids become a directory and a key prefix
pub(crate) fn validate_user(user_id: &str) -> Result<(), FormatError> {
    let ok = !user_id.is_empty()
        && user_id != "."
        && user_id != ".."
        && !user_id.contains(['/', '\\'])
        && !user_id.chars().any(char::is_control);
    if !ok {
        return Err(FormatError::InvalidUser(user_id.to_string()));
    }
    Ok(())
}
