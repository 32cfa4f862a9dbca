//! Vault status reported to front ends.

use serde::{Deserialize, Serialize};

/// Represents the current state of a user's vault session.
///
/// - `NotSetup` → `Unlocked` (after first-time setup)
/// - `Locked` → `Unlocked` (after a correct master password)
/// - `Unlocked` → `Locked` (explicit lock)
/// - `Locked` → `LockedOut` (too many failed unlocks; restart the unlock flow)
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum VaultStatus {
    /// No sealed vault stored for this user yet
    #[default]
    NotSetup,
    /// Vault exists but is locked (requires master password)
    Locked,
    /// Vault is open and entries are accessible
    Unlocked,
    /// Unlock flow was torn down after too many failures
    LockedOut,
}

impl std::fmt::Display for VaultStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotSetup => write!(f, "NotSetup"),
            Self::Locked => write!(f, "Locked"),
            Self::Unlocked => write!(f, "Unlocked"),
            Self::LockedOut => write!(f, "LockedOut"),
        }
    }
}
