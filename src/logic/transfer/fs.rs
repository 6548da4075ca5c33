//! Object store rooted at a local directory
//!
//! Keys map to relative paths under the root. Useful offline and in tests.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{validate_key, TransferClient, TransferError};

pub struct FsTransferClient {
    root: PathBuf,
}

impl FsTransferClient {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, key: &str) -> Result<PathBuf, TransferError> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }

    fn collect_keys(dir: &Path, prefix: &Path, out: &mut Vec<String>) -> std::io::Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                Self::collect_keys(&path, prefix, out)?;
            } else if let Ok(rel) = path.strip_prefix(prefix) {
                let key = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/");
                out.push(key);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl TransferClient for FsTransferClient {
    async fn upload(&self, local_path: &Path, remote_key: &str) -> Result<(), TransferError> {
        let dest = self.object_path(remote_key)?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(local_path, &dest).await?;
        log::debug!("Stored {:?} as {}", local_path, remote_key);
        Ok(())
    }

    async fn download(&self, remote_key: &str, local_path: &Path) -> Result<(), TransferError> {
        let src = self.object_path(remote_key)?;
        if !src.exists() {
            return Err(TransferError::NotFound(remote_key.to_string()));
        }
        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(&src, local_path).await?;
        Ok(())
    }

    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<String>, TransferError> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let root = self.root.clone();
        let mut keys = tokio::task::spawn_blocking(move || {
            let mut keys = Vec::new();
            Self::collect_keys(&root, &root, &mut keys).map(|_| keys)
        })
        .await
        .map_err(|e| TransferError::Network(e.to_string()))??;

        keys.retain(|k| k.starts_with(prefix));
        keys.sort();
        Ok(keys)
    }

    async fn delete(&self, remote_key: &str) -> Result<(), TransferError> {
        let path = self.object_path(remote_key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(TransferError::NotFound(remote_key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
