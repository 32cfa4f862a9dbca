//! Directory-backed secret store: one owner-only file per key.
//!
//! Values are replaced by writing a temp file and renaming it over the old
//! one, so a crash leaves either the previous or the new blob.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use super::{write_private_file, SecretStore};
use crate::error::{Error, Result};

const FILE_EXTENSION: &str = "vault";

#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|e| Error::Storage(format!("Could not create store directory: {}", e)))?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
            && !key.starts_with('.');
        if !valid {
            return Err(Error::Storage(format!("Invalid storage key: {:?}", key)));
        }
        Ok(self.dir.join(format!("{}.{}", key, FILE_EXTENSION)))
    }
}

async fn run_blocking<T, F>(op: F) -> Result<T>
where
    F: FnOnce() -> std::io::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| Error::Storage(format!("Storage task failed: {}", e)))?
        .map_err(|e| Error::Storage(e.to_string()))
}

#[async_trait]
impl SecretStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        run_blocking(move || match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        })
        .await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        let contents = value.as_bytes().to_vec();
        debug!("Writing {} bytes to file store", contents.len());
        run_blocking(move || write_private_file(&path, &contents)).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        run_blocking(move || match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip_and_replace() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("vaults")).unwrap();

        assert_eq!(store.get("vault_alice").await.unwrap(), None);
        store.set("vault_alice", "blob-1").await.unwrap();
        store.set("vault_alice", "blob-2").await.unwrap();
        assert_eq!(store.get("vault_alice").await.unwrap().as_deref(), Some("blob-2"));

        store.delete("vault_alice").await.unwrap();
        store.delete("vault_alice").await.unwrap();
        assert_eq!(store.get("vault_alice").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        FileStore::open(dir.path()).unwrap().set("vault_bob", "sealed").await.unwrap();

        let reopened = FileStore::open(dir.path()).unwrap();
        assert_eq!(reopened.get("vault_bob").await.unwrap().as_deref(), Some("sealed"));
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        assert!(matches!(store.set("../escape", "x").await, Err(Error::Storage(_))));
        assert!(matches!(store.get("a/b").await, Err(Error::Storage(_))));
        assert!(matches!(store.get("").await, Err(Error::Storage(_))));
    }
}
