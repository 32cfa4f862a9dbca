//! Sealed vault persistence on top of a [`SecretStore`].
//!
//! Each save serializes the whole container, derives a key from a fresh salt,
//! seals it under a fresh nonce and replaces the stored string in one `set`.
//! Loading reverses that using the salt embedded in the blob.
//!
//! The SHA-256 of the stored string is kept as a fingerprint. A save only
//! goes through when the store still holds the blob the caller last saw.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::error::{Error, Result};
use crate::storage::{Account, SecretStore};
use crate::vault::cipher::{open, seal, SealedBlob};
use crate::vault::container::{VaultContainer, VaultEntry, CURRENT_VERSION};
use crate::vault::kdf::{derive_key, KdfParams, MasterSecret, VaultKey};
use crate::vault::salt::generate_salt;

/// Result of opening (or not finding) a user's vault.
#[derive(Debug)]
pub struct LoadedVault {
    pub entries: Vec<VaultEntry>,
    pub key: VaultKey,
    /// Fingerprint of the stored blob, `None` if nothing was stored.
    pub fingerprint: Option<String>,
    pub existed: bool,
    /// Schema version the container was read from.
    pub version: String,
}

#[derive(Debug)]
pub struct SavedVault {
    pub key: VaultKey,
    pub fingerprint: String,
}

/// SHA-256 of a stored blob string, hex encoded.
pub fn fingerprint(encoded: &str) -> String {
    hex::encode(Sha256::digest(encoded.as_bytes()))
}

/// Runs key derivation and AEAD work off the async executor.
async fn run_crypto<T, F>(op: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| Error::CryptoUnavailable(format!("Crypto task failed: {}", e)))?
}

/// Reads and writes sealed vaults for any account in one store.
#[derive(Clone)]
pub struct VaultStorage {
    store: Arc<dyn SecretStore>,
    kdf: KdfParams,
}

impl VaultStorage {
    pub fn new(store: Arc<dyn SecretStore>, kdf: KdfParams) -> Self {
        Self { store, kdf }
    }

    pub async fn vault_exists(&self, account: &Account) -> Result<bool> {
        Ok(self.store.get(&account.vault_storage_key).await?.is_some())
    }

    /// Fingerprint of whatever is stored right now.
    pub async fn current_fingerprint(&self, account: &Account) -> Result<Option<String>> {
        let stored = self.store.get(&account.vault_storage_key).await?;
        Ok(stored.as_deref().map(fingerprint))
    }

    /// Open the user's vault with `secret`.
    ///
    /// An absent blob is an empty vault. A wrong password and a tampered blob
    /// both fail with [`Error::Authentication`].
    ///
    /// # Arguments
    /// * `account` - Selects the storage key.
    /// * `secret` - Master password used to derive the key.
    ///
    /// # Errors
    /// * [`Error::Authentication`] if the blob cannot be opened.
    /// * [`Error::Corrupted`] if the plaintext is not a vault container.
    /// * [`Error::CryptoUnavailable`] if key derivation cannot run.
    /// * Store errors from the read.
    pub async fn load_vault(&self, account: &Account, secret: &MasterSecret) -> Result<LoadedVault> {
        let params = self.kdf;
        let secret = secret.clone();

        let Some(encoded) = self.store.get(&account.vault_storage_key).await? else {
            debug!("No stored vault, starting empty");
            let key = run_crypto(move || {
                let salt = generate_salt()?;
                derive_key(&secret, &salt, &params)
            })
            .await?;
            return Ok(LoadedVault {
                entries: Vec::new(),
                key,
                fingerprint: None,
                existed: false,
                version: CURRENT_VERSION.to_string(),
            });
        };

        let stored_fingerprint = fingerprint(&encoded);
        let blob = SealedBlob::decode(&encoded)?;

        let (key, plaintext) = run_crypto(move || {
            let key = derive_key(&secret, blob.salt(), &params)?;
            let plaintext = open(&blob, &key)?;
            Ok((key, plaintext))
        })
        .await?;

        let container = VaultContainer::from_json(&plaintext)?;
        if container.version != CURRENT_VERSION {
            info!(
                "Read vault schema v{}, it will be rewritten as v{} on next save",
                container.version, CURRENT_VERSION
            );
        }
        info!("Vault opened ({} entries)", container.entries.len());

        Ok(LoadedVault {
            entries: container.entries,
            key,
            fingerprint: Some(stored_fingerprint),
            existed: true,
            version: container.version,
        })
    }

    /// Seal `entries` under `secret` and replace the stored blob.
    ///
    /// `expected` is the fingerprint the caller last observed (`None` when no
    /// blob was stored). If the store holds anything else the save is refused
    /// with [`Error::Conflict`] and nothing is written.
    ///
    /// # Errors
    /// * [`Error::Conflict`] as above.
    /// * [`Error::CryptoUnavailable`] if the OS RNG or the KDF fails.
    /// * Store errors from the read or the write.
    pub async fn save_vault(
        &self,
        account: &Account,
        secret: &MasterSecret,
        entries: &[VaultEntry],
        expected: Option<&str>,
    ) -> Result<SavedVault> {
        let current = self.current_fingerprint(account).await?;
        if current.as_deref() != expected {
            warn!("Stored vault changed since it was loaded, refusing to overwrite");
            return Err(Error::Conflict);
        }

        let plaintext = Zeroizing::new(VaultContainer::for_save(entries.to_vec()).to_json()?);
        let params = self.kdf;
        let secret = secret.clone();

        let (key, blob) = run_crypto(move || {
            let salt = generate_salt()?;
            let key = derive_key(&secret, &salt, &params)?;
            let blob = seal(&plaintext, &salt, &key)?;
            Ok((key, blob))
        })
        .await?;

        let encoded = blob.encode();
        self.store.set(&account.vault_storage_key, &encoded).await?;

        debug!("Saved vault ({} entries, {} bytes sealed)", entries.len(), encoded.len());
        Ok(SavedVault {
            key,
            fingerprint: fingerprint(&encoded),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::vault::container::NewEntry;
    use crate::vault::kdf::test_params;

    fn setup() -> (Arc<MemoryStore>, VaultStorage, Account) {
        let store = Arc::new(MemoryStore::new());
        let storage = VaultStorage::new(store.clone(), test_params());
        (store, storage, Account::new("alice"))
    }

    fn entry(site: &str) -> VaultEntry {
        NewEntry::new(site, "alice", "hunter22").into_entry().unwrap()
    }

    #[tokio::test]
    async fn test_absent_blob_is_empty_vault() {
        let (_, storage, account) = setup();
        let loaded = storage
            .load_vault(&account, &MasterSecret::new("Master#Pass1"))
            .await
            .unwrap();
        assert!(loaded.entries.is_empty());
        assert!(!loaded.existed);
        assert!(loaded.fingerprint.is_none());
        assert!(!storage.vault_exists(&account).await.unwrap());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let (_, storage, account) = setup();
        let secret = MasterSecret::new("Master#Pass1");
        let entries = vec![entry("example.com"), entry("mail.test")];

        let saved = storage.save_vault(&account, &secret, &entries, None).await.unwrap();
        let loaded = storage.load_vault(&account, &secret).await.unwrap();

        assert!(loaded.existed);
        assert_eq!(loaded.entries, entries);
        assert_eq!(loaded.fingerprint.as_deref(), Some(saved.fingerprint.as_str()));
        assert_eq!(loaded.version, CURRENT_VERSION);
    }

    #[tokio::test]
    async fn test_every_save_uses_fresh_salt_and_nonce() {
        let (store, storage, account) = setup();
        let secret = MasterSecret::new("Master#Pass1");
        let entries = vec![entry("example.com")];

        let first = storage.save_vault(&account, &secret, &entries, None).await.unwrap();
        let blob_a = store.get(&account.vault_storage_key).await.unwrap().unwrap();
        storage
            .save_vault(&account, &secret, &entries, Some(&first.fingerprint))
            .await
            .unwrap();
        let blob_b = store.get(&account.vault_storage_key).await.unwrap().unwrap();

        assert_ne!(blob_a, blob_b);
        let a = SealedBlob::decode(&blob_a).unwrap();
        let b = SealedBlob::decode(&blob_b).unwrap();
        assert_ne!(a.salt(), b.salt());
        assert_ne!(a.nonce(), b.nonce());

        let loaded = storage.load_vault(&account, &secret).await.unwrap();
        assert_eq!(loaded.entries, entries);
    }

    #[tokio::test]
    async fn test_wrong_password_is_authentication_error() {
        let (_, storage, account) = setup();
        storage
            .save_vault(&account, &MasterSecret::new("Master#Pass1"), &[entry("a.com")], None)
            .await
            .unwrap();

        let result = storage.load_vault(&account, &MasterSecret::new("wrong")).await;
        assert!(matches!(result, Err(Error::Authentication)));
    }

    #[tokio::test]
    async fn test_tampered_blob_is_authentication_error() {
        let (store, storage, account) = setup();
        let secret = MasterSecret::new("Master#Pass1");
        storage.save_vault(&account, &secret, &[entry("a.com")], None).await.unwrap();

        let mut encoded = store.get(&account.vault_storage_key).await.unwrap().unwrap();
        // Flip a character inside the base64 body
        let mid = encoded.len() / 2;
        let replacement = if &encoded[mid..mid + 1] == "A" { "B" } else { "A" };
        encoded.replace_range(mid..mid + 1, replacement);
        store.set(&account.vault_storage_key, &encoded).await.unwrap();

        let result = storage.load_vault(&account, &secret).await;
        assert!(matches!(result, Err(Error::Authentication)));
    }

    #[tokio::test]
    async fn test_stale_fingerprint_is_conflict() {
        let (store, storage, account) = setup();
        let secret = MasterSecret::new("Master#Pass1");
        let first = storage.save_vault(&account, &secret, &[entry("a.com")], None).await.unwrap();

        // Another writer replaces the blob
        storage
            .save_vault(&account, &secret, &[entry("b.com")], Some(&first.fingerprint))
            .await
            .unwrap();
        let before = store.get(&account.vault_storage_key).await.unwrap();

        let result = storage
            .save_vault(&account, &secret, &[entry("c.com")], Some(&first.fingerprint))
            .await;
        assert!(matches!(result, Err(Error::Conflict)));
        assert_eq!(store.get(&account.vault_storage_key).await.unwrap(), before);

        // Expecting no blob when one exists is a conflict too
        let result = storage.save_vault(&account, &secret, &[], None).await;
        assert!(matches!(result, Err(Error::Conflict)));
    }

    #[tokio::test]
    async fn test_legacy_array_blob_loads() {
        let (store, storage, account) = setup();
        let secret = MasterSecret::new("Master#Pass1");

        let legacy = br#"[{"site":"old.example","username":"bob","password":"pw1"},
                          {"site":"old.example","username":"bob2","password":"pw2"}]"#;
        let salt = generate_salt().unwrap();
        let key = derive_key(&secret, &salt, &test_params()).unwrap();
        let blob = seal(legacy, &salt, &key).unwrap();
        store.set(&account.vault_storage_key, &blob.encode()).await.unwrap();

        let loaded = storage.load_vault(&account, &secret).await.unwrap();
        assert_eq!(loaded.version, "0");
        assert_eq!(loaded.entries.len(), 2);
        assert_ne!(loaded.entries[0].id, loaded.entries[1].id);
    }

    #[tokio::test]
    async fn test_unparseable_payload_is_corrupted() {
        let (store, storage, account) = setup();
        let secret = MasterSecret::new("Master#Pass1");

        let salt = generate_salt().unwrap();
        let key = derive_key(&secret, &salt, &test_params()).unwrap();
        let blob = seal(b"not json", &salt, &key).unwrap();
        store.set(&account.vault_storage_key, &blob.encode()).await.unwrap();

        let result = storage.load_vault(&account, &secret).await;
        assert!(matches!(result, Err(Error::Corrupted(_))));
    }

    #[test]
    fn test_fingerprint_is_stable_hex() {
        let a = fingerprint("blob");
        assert_eq!(a, fingerprint("blob"));
        assert_ne!(a, fingerprint("blob2"));
        assert_eq!(a.len(), 64);
    }
}
