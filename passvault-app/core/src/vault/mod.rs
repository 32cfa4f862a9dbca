//! Encrypted vault: key derivation, sealing, container format and the
//! locked/unlocked state machine.
//!
//! A vault is protected by the user's master password, which is turned into
//! an AES-256-GCM key via Argon2id with a fresh salt on every save.

pub mod auth;
pub mod cipher;
pub mod container;
pub mod kdf;
pub mod lockout;
pub mod manager;
pub mod persistence;
pub mod salt;

pub use auth::VaultStatus;
pub use cipher::SealedBlob;
pub use container::{EntryUpdate, NewEntry, VaultContainer, VaultEntry};
pub use kdf::{derive_key, KdfParams, MasterSecret, VaultKey};
pub use lockout::{AttemptOutcome, UnlockAttempts};
pub use manager::VaultManager;
pub use persistence::{LoadedVault, SavedVault, VaultStorage};
pub use salt::generate_salt;
