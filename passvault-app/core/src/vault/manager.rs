//! VaultManager - in-memory half of the vault state machine.
//!
//! The manager is either fully locked (nothing in memory) or fully unlocked
//! (entries, derived key and master secret all present). It never touches
//! storage: mutations are *staged* into a new entry list, the caller persists
//! that list, and only then is it committed. A failed save leaves the
//! manager exactly as it was.

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::vault::container::{validate_query, EntryUpdate, NewEntry, VaultEntry};
use crate::vault::kdf::{MasterSecret, VaultKey};
use crate::vault::persistence::LoadedVault;

enum VaultState {
    Locked,
    Unlocked {
        entries: Vec<VaultEntry>,
        key: VaultKey,
        secret: MasterSecret,
    },
}

/// A staged mutation: the full entry list to persist plus the affected id.
#[derive(Debug)]
pub struct StagedChange {
    pub entries: Vec<VaultEntry>,
    pub entry_id: String,
}

pub struct VaultManager {
    state: VaultState,
}

impl Default for VaultManager {
    fn default() -> Self {
        Self::new()
    }
}

impl VaultManager {
    pub fn new() -> Self {
        Self {
            state: VaultState::Locked,
        }
    }

    pub fn is_unlocked(&self) -> bool {
        matches!(self.state, VaultState::Unlocked { .. })
    }

    /// Install a freshly opened vault.
    pub fn unlock_with(&mut self, loaded: LoadedVault, secret: MasterSecret) {
        let LoadedVault { entries, key, .. } = loaded;
        debug!("Unlocking with {} entries", entries.len());
        self.state = VaultState::Unlocked {
            entries,
            key,
            secret,
        };
    }

    /// Drop entries, key and secret. They are zeroized as they go out of scope.
    pub fn lock(&mut self) {
        if self.is_unlocked() {
            self.state = VaultState::Locked;
            info!("Vault locked");
        }
    }

    pub fn entries(&self) -> Result<&[VaultEntry]> {
        match &self.state {
            VaultState::Unlocked { entries, .. } => Ok(entries),
            VaultState::Locked => Err(Error::Locked),
        }
    }

    pub fn secret(&self) -> Result<&MasterSecret> {
        match &self.state {
            VaultState::Unlocked { secret, .. } => Ok(secret),
            VaultState::Locked => Err(Error::Locked),
        }
    }

    pub fn key(&self) -> Result<&VaultKey> {
        match &self.state {
            VaultState::Unlocked { key, .. } => Ok(key),
            VaultState::Locked => Err(Error::Locked),
        }
    }

    pub fn entry(&self, id: &str) -> Result<&VaultEntry> {
        self.entries()?
            .iter()
            .find(|e| e.id == id)
            .ok_or_else(|| Error::EntryNotFound(id.to_string()))
    }

    /// Case-insensitive substring search on site and username.
    /// An empty query matches everything.
    pub fn search(&self, query: &str) -> Result<Vec<&VaultEntry>> {
        validate_query(query)?;
        let entries = self.entries()?;
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(entries.iter().collect());
        }
        Ok(entries.iter().filter(|e| e.matches(&needle)).collect())
    }

    pub fn stage_add(&self, new_entry: NewEntry) -> Result<StagedChange> {
        let current = self.entries()?;
        let entry = new_entry.into_entry()?;
        let entry_id = entry.id.clone();

        let mut entries = current.to_vec();
        entries.push(entry);
        Ok(StagedChange { entries, entry_id })
    }

    pub fn stage_update(&self, id: &str, update: &EntryUpdate) -> Result<StagedChange> {
        let current = self.entries()?;
        let update = update.validated()?;

        let mut entries = current.to_vec();
        let entry = entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| Error::EntryNotFound(id.to_string()))?;
        if !entry.apply(&update) {
            return Err(Error::Validation("No changes to apply".into()));
        }

        Ok(StagedChange {
            entries,
            entry_id: id.to_string(),
        })
    }

    pub fn stage_delete(&self, id: &str) -> Result<StagedChange> {
        let current = self.entries()?;
        if !current.iter().any(|e| e.id == id) {
            return Err(Error::EntryNotFound(id.to_string()));
        }

        let entries = current.iter().filter(|e| e.id != id).cloned().collect();
        Ok(StagedChange {
            entries,
            entry_id: id.to_string(),
        })
    }

    /// Install entries that have been persisted.
    pub fn commit(&mut self, new_entries: Vec<VaultEntry>) -> Result<()> {
        match &mut self.state {
            VaultState::Unlocked { entries, .. } => {
                *entries = new_entries;
                Ok(())
            }
            VaultState::Locked => Err(Error::Locked),
        }
    }

    /// Switch to a new secret and key after a successful re-seal.
    pub fn replace_credentials(&mut self, new_secret: MasterSecret, new_key: VaultKey) -> Result<()> {
        match &mut self.state {
            VaultState::Unlocked { key, secret, .. } => {
                *key = new_key;
                *secret = new_secret;
                Ok(())
            }
            VaultState::Locked => Err(Error::Locked),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::container::CURRENT_VERSION;

    fn unlocked_with(sites: &[(&str, &str)]) -> VaultManager {
        let entries = sites
            .iter()
            .map(|(site, user)| NewEntry::new(*site, *user, "pw12345678").into_entry().unwrap())
            .collect();
        let mut manager = VaultManager::new();
        manager.unlock_with(
            LoadedVault {
                entries,
                key: VaultKey::from_bytes([7u8; 32]),
                fingerprint: None,
                existed: true,
                version: CURRENT_VERSION.to_string(),
            },
            MasterSecret::new("Master#Pass1"),
        );
        manager
    }

    #[test]
    fn test_locked_manager_refuses_everything() {
        let manager = VaultManager::new();
        assert!(!manager.is_unlocked());
        assert!(matches!(manager.entries(), Err(Error::Locked)));
        assert!(matches!(manager.search(""), Err(Error::Locked)));
        assert!(matches!(manager.secret(), Err(Error::Locked)));
        assert!(matches!(
            manager.stage_add(NewEntry::new("a.com", "u", "password")),
            Err(Error::Locked)
        ));
    }

    #[test]
    fn test_lock_clears_state() {
        let mut manager = unlocked_with(&[("example.com", "alice")]);
        assert!(manager.is_unlocked());
        manager.lock();
        assert!(!manager.is_unlocked());
        assert!(matches!(manager.key(), Err(Error::Locked)));
    }

    #[test]
    fn test_search_is_case_insensitive_substring() {
        let manager = unlocked_with(&[
            ("example.com", "alice"),
            ("mail.test", "EXAMPLE-user"),
            ("other.org", "bob"),
        ]);

        let hits = manager.search("EXA").unwrap();
        assert_eq!(hits.len(), 2);

        assert_eq!(manager.search("").unwrap().len(), 3);
        assert!(manager.search("nothing").unwrap().is_empty());
        assert_eq!(manager.entries().unwrap().len(), 3);
    }

    #[test]
    fn test_staging_does_not_touch_state() {
        let manager = unlocked_with(&[("example.com", "alice")]);
        let id = manager.entries().unwrap()[0].id.clone();

        let added = manager.stage_add(NewEntry::new("new.com", "bob", "password")).unwrap();
        assert_eq!(added.entries.len(), 2);

        let deleted = manager.stage_delete(&id).unwrap();
        assert!(deleted.entries.is_empty());

        assert_eq!(manager.entries().unwrap().len(), 1);
    }

    #[test]
    fn test_commit_installs_staged_entries() {
        let mut manager = unlocked_with(&[("example.com", "alice")]);
        let staged = manager.stage_add(NewEntry::new("new.com", "bob", "password")).unwrap();
        let new_id = staged.entry_id.clone();

        manager.commit(staged.entries).unwrap();
        assert_eq!(manager.entry(&new_id).unwrap().site, "new.com");
    }

    #[test]
    fn test_update_and_delete_unknown_id() {
        let manager = unlocked_with(&[("example.com", "alice")]);
        let update = EntryUpdate {
            password: Some("newpassword".into()),
            ..Default::default()
        };
        assert!(matches!(manager.stage_update("missing", &update), Err(Error::EntryNotFound(_))));
        assert!(matches!(manager.stage_delete("missing"), Err(Error::EntryNotFound(_))));
    }

    #[test]
    fn test_update_without_changes_is_rejected() {
        let manager = unlocked_with(&[("example.com", "alice")]);
        let id = manager.entries().unwrap()[0].id.clone();

        let same = EntryUpdate {
            site: Some("example.com".into()),
            ..Default::default()
        };
        assert!(matches!(manager.stage_update(&id, &same), Err(Error::Validation(_))));
        assert!(matches!(
            manager.stage_update(&id, &EntryUpdate::default()),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_update_bumps_timestamp() {
        let manager = unlocked_with(&[("example.com", "alice")]);
        let before = manager.entries().unwrap()[0].clone();

        let update = EntryUpdate {
            username: Some("alice2".into()),
            ..Default::default()
        };
        let staged = manager.stage_update(&before.id, &update).unwrap();
        let after = &staged.entries[0];

        assert_eq!(after.username, "alice2");
        assert_eq!(after.created_at, before.created_at);
        assert!(after.updated_at > before.updated_at);
    }

    #[test]
    fn test_replace_credentials() {
        let mut manager = unlocked_with(&[]);
        manager
            .replace_credentials(MasterSecret::new("N3w!Password"), VaultKey::from_bytes([9u8; 32]))
            .unwrap();
        assert!(manager.secret().unwrap().matches("N3w!Password"));
        assert_eq!(manager.key().unwrap().as_bytes(), &[9u8; 32]);
    }
}
