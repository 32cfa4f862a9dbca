//! One logged-in user's vault session.
//!
//! `VaultSession` owns the vault state machine, the unlock attempt counter
//! and the fingerprint of the blob it last read or wrote. Everything sits
//! behind one async mutex, and a mutation holds that mutex across
//! stage → save → commit. Mutations are therefore applied one at a time and
//! the stored blob always contains every mutation that returned `Ok`.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::security::audit::{SecurityEventKind, SecurityLogger};
use crate::security::strength::assess_strength;
use crate::storage::{Account, SecretStore};
use crate::vault::auth::VaultStatus;
use crate::vault::container::{EntryUpdate, NewEntry, VaultEntry, CURRENT_VERSION};
use crate::vault::kdf::{KdfParams, MasterSecret};
use crate::vault::lockout::{AttemptOutcome, UnlockAttempts, DEFAULT_MAX_ATTEMPTS};
use crate::vault::manager::{StagedChange, VaultManager};
use crate::vault::persistence::{LoadedVault, VaultStorage};

struct SessionInner {
    manager: VaultManager,
    attempts: UnlockAttempts,
    /// Set when the attempt threshold is reached; cleared by `enter_unlock_flow`.
    torn_down: bool,
    /// Fingerprint of the blob this session last loaded or saved.
    fingerprint: Option<String>,
}

pub struct VaultSession {
    account: Account,
    storage: VaultStorage,
    audit: SecurityLogger,
    inner: Mutex<SessionInner>,
}

impl VaultSession {
    /// Create a locked session for `account` over `store`.
    ///
    /// Keys are derived with the default Argon2id cost and the unlock flow
    /// allows [`DEFAULT_MAX_ATTEMPTS`] wrong passwords. Neither is
    /// configurable.
    pub fn new(store: Arc<dyn SecretStore>, account: Account) -> Self {
        Self::with_kdf(store, account, KdfParams::default())
    }

    pub(crate) fn with_kdf(store: Arc<dyn SecretStore>, account: Account, kdf: KdfParams) -> Self {
        Self {
            account,
            storage: VaultStorage::new(store, kdf),
            audit: SecurityLogger::disabled(),
            inner: Mutex::new(SessionInner {
                manager: VaultManager::new(),
                attempts: UnlockAttempts::new(DEFAULT_MAX_ATTEMPTS),
                torn_down: false,
                fingerprint: None,
            }),
        }
    }

    /// Record security events with `logger`.
    pub fn with_audit_log(mut self, logger: SecurityLogger) -> Self {
        self.audit = logger;
        self
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    async fn log(&self, kind: SecurityEventKind, success: bool, details: &str) {
        self.audit
            .log_event(kind, Some(&self.account.username), success, details)
            .await;
    }

    /// Current state of the vault as seen by this session.
    ///
    /// # Errors
    /// Store errors while checking whether a vault exists.
    pub async fn status(&self) -> Result<VaultStatus> {
        let inner = self.inner.lock().await;
        if inner.torn_down {
            return Ok(VaultStatus::LockedOut);
        }
        if inner.manager.is_unlocked() {
            return Ok(VaultStatus::Unlocked);
        }
        if self.storage.vault_exists(&self.account).await? {
            Ok(VaultStatus::Locked)
        } else {
            Ok(VaultStatus::NotSetup)
        }
    }

    pub async fn vault_exists(&self) -> Result<bool> {
        self.storage.vault_exists(&self.account).await
    }

    /// Unlock attempts left before the flow is torn down.
    pub async fn remaining_attempts(&self) -> u32 {
        self.inner.lock().await.attempts.remaining()
    }

    /// First-time setup: seal an empty vault under `secret` and unlock it.
    ///
    /// # Arguments
    /// * `secret` - The new master password; it must pass the strength policy.
    ///
    /// # Errors
    /// * [`Error::Validation`] if the password is too weak.
    /// * [`Error::AlreadyExists`] if a vault is already stored or unlocked.
    /// * Store and crypto errors from sealing.
    pub async fn create_vault(&self, secret: MasterSecret) -> Result<()> {
        let mut inner = self.inner.lock().await;

        let report = assess_strength(secret.as_str());
        if !report.is_valid {
            return Err(Error::Validation(report.reasons.join("; ")));
        }
        if inner.manager.is_unlocked() || self.storage.vault_exists(&self.account).await? {
            return Err(Error::AlreadyExists);
        }

        let saved = self
            .storage
            .save_vault(&self.account, &secret, &[], None)
            .await?;

        inner.fingerprint = Some(saved.fingerprint.clone());
        inner.attempts.reset();
        inner.manager.unlock_with(
            LoadedVault {
                entries: Vec::new(),
                key: saved.key,
                fingerprint: Some(saved.fingerprint),
                existed: true,
                version: CURRENT_VERSION.to_string(),
            },
            secret,
        );

        info!("Vault created");
        self.log(SecurityEventKind::VaultCreated, true, "empty vault sealed")
            .await;
        Ok(())
    }

    /// Open the vault with `secret`.
    ///
    /// Only a wrong password counts towards the lockout threshold. The
    /// attempt that reaches it returns [`Error::LockedOut`] and every later
    /// attempt does too, until [`enter_unlock_flow`](Self::enter_unlock_flow).
    ///
    /// # Errors
    /// * [`Error::Authentication`] for a wrong password or a tampered blob.
    /// * [`Error::LockedOut`] once the threshold is reached.
    /// * [`Error::Corrupted`] if the decrypted payload cannot be parsed.
    /// * Store errors, which are not counted as attempts.
    pub async fn unlock(&self, secret: MasterSecret) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.torn_down {
            return Err(Error::LockedOut);
        }

        match self.storage.load_vault(&self.account, &secret).await {
            Ok(loaded) => {
                let count = loaded.entries.len();
                inner.fingerprint = loaded.fingerprint.clone();
                inner.attempts.reset();
                inner.manager.unlock_with(loaded, secret);

                self.log(
                    SecurityEventKind::VaultUnlocked,
                    true,
                    &format!("{} entries", count),
                )
                .await;
                Ok(())
            }
            Err(Error::Authentication) => {
                inner.manager.lock();
                match inner.attempts.record_failure() {
                    AttemptOutcome::Retry { remaining } => {
                        self.log(
                            SecurityEventKind::UnlockFailed,
                            false,
                            &format!("{} attempts remaining", remaining),
                        )
                        .await;
                        Err(Error::Authentication)
                    }
                    AttemptOutcome::Exhausted => {
                        inner.torn_down = true;
                        inner.fingerprint = None;
                        warn!(
                            "Unlock flow torn down after {} failed attempts",
                            inner.attempts.failures()
                        );
                        self.log(
                            SecurityEventKind::UnlockLockedOut,
                            false,
                            &format!("{} failed attempts", inner.attempts.failures()),
                        )
                        .await;
                        Err(Error::LockedOut)
                    }
                }
            }
            Err(e) => {
                debug!("Unlock failed without counting an attempt: {}", e.code());
                Err(e)
            }
        }
    }

    /// Leave the unlocked state, wiping entries and key material.
    ///
    /// Locking an already locked session leaves the attempt counter alone.
    pub async fn lock(&self) {
        let mut inner = self.inner.lock().await;
        if !inner.manager.is_unlocked() {
            return;
        }
        inner.manager.lock();
        inner.attempts.reset();
        inner.fingerprint = None;
        self.log(SecurityEventKind::VaultLocked, true, "").await;
    }

    /// Start the unlock flow over after a teardown.
    pub async fn enter_unlock_flow(&self) {
        let mut inner = self.inner.lock().await;
        inner.torn_down = false;
        inner.attempts.reset();
    }

    /// Log out: lock and forget any teardown.
    pub async fn end_session(&self) {
        self.lock().await;
        let mut inner = self.inner.lock().await;
        inner.torn_down = false;
        inner.attempts.reset();
        info!("Session ended");
    }

    /// All entries in stored order. Fails with [`Error::Locked`] when locked.
    pub async fn entries(&self) -> Result<Vec<VaultEntry>> {
        Ok(self.inner.lock().await.manager.entries()?.to_vec())
    }

    pub async fn entry(&self, id: &str) -> Result<VaultEntry> {
        self.inner.lock().await.manager.entry(id).cloned()
    }

    /// Entries whose site or username contains `query`, ignoring case. An
    /// empty query returns every entry.
    pub async fn search(&self, query: &str) -> Result<Vec<VaultEntry>> {
        let inner = self.inner.lock().await;
        let hits = inner.manager.search(query)?;
        Ok(hits.into_iter().cloned().collect())
    }

    /// Add an entry and persist the vault.
    ///
    /// # Arguments
    /// * `new_entry` - Site, username and password; an id and timestamps are
    ///   assigned here.
    ///
    /// # Errors
    /// * [`Error::Locked`] or [`Error::Validation`] before anything is saved.
    /// * [`Error::Conflict`] if another writer replaced the stored blob.
    /// * Store and crypto errors; the in-memory vault is left unchanged.
    pub async fn add_entry(&self, new_entry: NewEntry) -> Result<VaultEntry> {
        let mut inner = self.inner.lock().await;
        let StagedChange { entries, entry_id } = inner.manager.stage_add(new_entry)?;
        self.persist(&mut inner, entries).await?;

        self.log(SecurityEventKind::EntryAdded, true, &format!("id {}", entry_id))
            .await;
        inner.manager.entry(&entry_id).cloned()
    }

    /// Apply the fields set in `update` to entry `id` and persist.
    ///
    /// # Errors
    /// Same as [`add_entry`](Self::add_entry), plus [`Error::EntryNotFound`].
    pub async fn update_entry(&self, id: &str, update: EntryUpdate) -> Result<VaultEntry> {
        let mut inner = self.inner.lock().await;
        let StagedChange { entries, entry_id } = inner.manager.stage_update(id, &update)?;
        self.persist(&mut inner, entries).await?;

        self.log(SecurityEventKind::EntryUpdated, true, &format!("id {}", entry_id))
            .await;
        inner.manager.entry(&entry_id).cloned()
    }

    /// Remove entry `id` and persist.
    pub async fn delete_entry(&self, id: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let StagedChange { entries, entry_id } = inner.manager.stage_delete(id)?;
        self.persist(&mut inner, entries).await?;

        self.log(SecurityEventKind::EntryDeleted, true, &format!("id {}", entry_id))
            .await;
        Ok(())
    }

    /// Re-seal the vault under `new`.
    ///
    /// `old` must match the session's secret; a mismatch is not an unlock
    /// attempt and does not count towards lockout. On any failure the stored
    /// blob and the session keep the old password.
    ///
    /// # Errors
    /// * [`Error::Authentication`] if `old` does not match.
    /// * [`Error::Validation`] if `new` fails the strength policy.
    /// * [`Error::Conflict`], store and crypto errors from the re-seal.
    pub async fn change_master_password(&self, old: &str, new: MasterSecret) -> Result<()> {
        let mut inner = self.inner.lock().await;

        if !inner.manager.secret()?.matches(old) {
            self.log(
                SecurityEventKind::MasterPasswordChanged,
                false,
                "current password mismatch",
            )
            .await;
            return Err(Error::Authentication);
        }

        let report = assess_strength(new.as_str());
        if !report.is_valid {
            return Err(Error::Validation(report.reasons.join("; ")));
        }

        let entries = inner.manager.entries()?.to_vec();
        let saved = self
            .storage
            .save_vault(&self.account, &new, &entries, inner.fingerprint.as_deref())
            .await?;

        inner.fingerprint = Some(saved.fingerprint);
        inner.manager.replace_credentials(new, saved.key)?;

        info!("Master password changed ({} entries re-sealed)", entries.len());
        self.log(SecurityEventKind::MasterPasswordChanged, true, "").await;
        Ok(())
    }

    /// Save `entries` and install them. Nothing changes in memory on failure.
    async fn persist(&self, inner: &mut SessionInner, entries: Vec<VaultEntry>) -> Result<()> {
        let secret = inner.manager.secret()?.clone();
        let saved = self
            .storage
            .save_vault(&self.account, &secret, &entries, inner.fingerprint.as_deref())
            .await?;

        inner.fingerprint = Some(saved.fingerprint);
        inner.manager.replace_credentials(secret, saved.key)?;
        inner.manager.commit(entries)
    }
}
