//! User registry: which usernames exist and where their sealed vault lives.
//!
//! The registry holds no secrets. Picking a username only selects a storage
//! key; authentication happens when the vault is unlocked.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use super::write_private_file;
use crate::error::{Error, Result};

pub const USERS_FILE_NAME: &str = "users.json";

const USERNAME_MIN_LENGTH: usize = 3;
const USERNAME_MAX_LENGTH: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub username: String,
    pub vault_storage_key: String,
}

impl Account {
    pub fn new(username: impl Into<String>) -> Self {
        let username = username.into();
        let vault_storage_key = format!("vault_{}", username);
        Self {
            username,
            vault_storage_key,
        }
    }
}

pub fn validate_username(username: &str) -> Result<()> {
    if username.trim().is_empty() {
        return Err(Error::Validation("Username cannot be empty".into()));
    }
    if username.len() < USERNAME_MIN_LENGTH {
        return Err(Error::Validation(format!(
            "Username must be at least {} characters long",
            USERNAME_MIN_LENGTH
        )));
    }
    if username.len() > USERNAME_MAX_LENGTH {
        return Err(Error::Validation(format!(
            "Username must be no more than {} characters long",
            USERNAME_MAX_LENGTH
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(Error::Validation(
            "Username can only contain letters, numbers, underscores, and hyphens".into(),
        ));
    }
    Ok(())
}

/// `users.json` in the data directory.
#[derive(Debug, Clone)]
pub struct UserRegistry {
    path: PathBuf,
}

impl UserRegistry {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(USERS_FILE_NAME),
        }
    }

    pub fn load(&self) -> Result<Vec<Account>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| Error::Storage(format!("Failed to read users file: {}", e)))?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&content)
            .map_err(|e| Error::Storage(format!("Failed to parse users file: {}", e)))
    }

    pub fn save(&self, accounts: &[Account]) -> Result<()> {
        let content = serde_json::to_string_pretty(accounts)?;
        write_private_file(&self.path, content.as_bytes())
            .map_err(|e| Error::Storage(format!("Failed to write users file: {}", e)))
    }

    pub fn register(&self, username: &str) -> Result<Account> {
        validate_username(username)?;

        let mut accounts = self.load()?;
        if accounts.iter().any(|a| a.username == username) {
            return Err(Error::UserExists(username.to_string()));
        }

        let account = Account::new(username);
        accounts.push(account.clone());
        self.save(&accounts)?;

        info!("Registered user ({} accounts total)", accounts.len());
        Ok(account)
    }

    /// Select an account by username.
    pub fn find(&self, username: &str) -> Result<Account> {
        self.load()?
            .into_iter()
            .find(|a| a.username == username)
            .ok_or_else(|| Error::UserNotFound(username.to_string()))
    }

    pub fn exists(&self, username: &str) -> bool {
        self.load()
            .map(|accounts| accounts.iter().any(|a| a.username == username))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_find() {
        let dir = tempfile::tempdir().unwrap();
        let registry = UserRegistry::new(dir.path());

        let account = registry.register("alice").unwrap();
        assert_eq!(account.vault_storage_key, "vault_alice");
        assert_eq!(registry.find("alice").unwrap(), account);
        assert!(registry.exists("alice"));
        assert!(matches!(registry.find("bob"), Err(Error::UserNotFound(_))));
    }

    #[test]
    fn test_duplicate_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let registry = UserRegistry::new(dir.path());
        registry.register("alice").unwrap();
        assert!(matches!(registry.register("alice"), Err(Error::UserExists(_))));
        assert_eq!(registry.load().unwrap().len(), 1);
    }

    #[test]
    fn test_file_format() {
        let dir = tempfile::tempdir().unwrap();
        let registry = UserRegistry::new(dir.path());
        registry.register("carol_1").unwrap();

        let raw = std::fs::read_to_string(dir.path().join(USERS_FILE_NAME)).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json[0]["username"], "carol_1");
        assert_eq!(json[0]["vaultStorageKey"], "vault_carol_1");
    }

    #[test]
    fn test_validate_username() {
        assert!(validate_username("ab").is_err());
        assert!(validate_username("a".repeat(21).as_str()).is_err());
        assert!(validate_username("bad name").is_err());
        assert!(validate_username("../etc").is_err());
        assert!(validate_username("good-name_1").is_ok());
    }
}
