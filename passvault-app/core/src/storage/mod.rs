//! Durable storage: the secret store the sealed vaults live in, the user
//! registry and the settings file.

mod config;
mod file;
#[cfg(feature = "os-keyring")]
mod keyring;
mod memory;
mod registry;

use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;

pub use config::{load_settings, save_settings, VaultSettings, SETTINGS_FILE_NAME};
pub use file::FileStore;
#[cfg(feature = "os-keyring")]
pub use self::keyring::KeyringStore;
pub use memory::MemoryStore;
pub use registry::{validate_username, Account, UserRegistry, USERS_FILE_NAME};

/// Durable map from string key to string value.
///
/// Implementations provide at-rest protection of the medium; the vault only
/// ever stores already-sealed blobs here. `set` must replace the previous
/// value as a single operation so a crash leaves either the old or the new
/// value. There is no cross-writer coordination.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Write `contents` to `path` via a temp file and rename, owner-only on Unix.
pub(crate) fn write_private_file(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use std::io::Write;

    let temp_path = path.with_extension("tmp");
    {
        let mut options = std::fs::OpenOptions::new();
        options.create(true).write(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&temp_path)?;
        file.write_all(contents)?;
        file.sync_all()?;
    }
    std::fs::rename(&temp_path, path)?;

    // Set restrictive permissions on Unix (the file may predate this write)
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(path)?.permissions();
        perms.set_mode(0o600);
        std::fs::set_permissions(path, perms)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_private_file_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.dat");

        write_private_file(&path, b"first").unwrap();
        write_private_file(&path, b"second").unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"second");
        assert!(!path.with_extension("tmp").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_write_private_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.dat");
        write_private_file(&path, b"x").unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
