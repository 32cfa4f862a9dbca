//! OS keyring secret store.
//!
//! - **macOS**: Keychain Access
//! - **Windows**: Credential Manager
//! - **Linux**: Secret Service API (GNOME Keyring, KWallet)
//!
//! Each storage key becomes one keyring entry under [`SERVICE_NAME`].
//! Windows caps a credential at about 2.5 KB, which limits a vault there to a
//! handful of entries; prefer [`FileStore`](super::FileStore) for large vaults.

use async_trait::async_trait;
use keyring::Entry;
use tracing::{debug, error, warn};

use super::SecretStore;
use crate::error::{Error, Result};

/// Service name used for keyring entries.
pub const SERVICE_NAME: &str = "dev.passvault.vault";

#[derive(Debug, Clone)]
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    /// Probe the keyring so callers can fall back to a file store up front.
    pub async fn check_availability(&self) -> Result<()> {
        let service = self.service.clone();
        blocking(move || {
            let entry = Entry::new(&service, "availability-probe").map_err(map_keyring_error)?;
            match entry.get_password() {
                Ok(_) | Err(keyring::Error::NoEntry) => Ok(()),
                Err(e) => {
                    warn!("Keyring not accessible: {:?}", e);
                    Err(map_keyring_error(e))
                }
            }
        })
        .await
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

async fn blocking<T, F>(op: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| Error::Storage(format!("Keyring task failed: {}", e)))?
}

/// Map keyring errors to our error type.
fn map_keyring_error(err: keyring::Error) -> Error {
    match err {
        keyring::Error::NoStorageAccess(e) => Error::Storage(format!("Keyring access denied: {:?}", e)),
        keyring::Error::PlatformFailure(e) => Error::Storage(format!("Keyring platform failure: {:?}", e)),
        keyring::Error::Ambiguous(_) => Error::Storage("Multiple keyring entries found".into()),
        other => Error::Storage(format!("Keyring error: {}", other)),
    }
}

#[async_trait]
impl SecretStore for KeyringStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let (service, account) = (self.service.clone(), key.to_string());
        blocking(move || {
            let entry = Entry::new(&service, &account).map_err(map_keyring_error)?;
            match entry.get_password() {
                Ok(value) => {
                    debug!("Retrieved {} chars from keyring", value.len());
                    Ok(Some(value))
                }
                Err(keyring::Error::NoEntry) => Ok(None),
                Err(e) => {
                    error!("Failed to read keyring entry: {:?}", e);
                    Err(map_keyring_error(e))
                }
            }
        })
        .await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let (service, account, value) = (self.service.clone(), key.to_string(), value.to_string());
        blocking(move || {
            let entry = Entry::new(&service, &account).map_err(map_keyring_error)?;
            entry.set_password(&value).map_err(|e| {
                error!("Failed to store keyring entry: {:?}", e);
                map_keyring_error(e)
            })?;

            // Read back through a fresh Entry so a cached value can't mask a failed write
            let verify = Entry::new(&service, &account).map_err(map_keyring_error)?;
            match verify.get_password() {
                Ok(readback) if readback == value => Ok(()),
                Ok(_) => Err(Error::Storage("Keyring verification failed: data mismatch".into())),
                Err(e) => Err(map_keyring_error(e)),
            }
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let (service, account) = (self.service.clone(), key.to_string());
        blocking(move || {
            let entry = Entry::new(&service, &account).map_err(map_keyring_error)?;
            match entry.delete_credential() {
                Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
                Err(e) => Err(map_keyring_error(e)),
            }
        })
        .await
    }
}
