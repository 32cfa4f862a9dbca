//! Error taxonomy shared by every vault operation.
//!
//! Callers decide what to show by matching on the variant, never on the
//! message text. `user_message()` gives the least specific text that is
//! still actionable.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Bad input from the caller (generator options, empty fields, ...).
    #[error("Validation error: {0}")]
    Validation(String),

    /// AEAD tag verification failed. Wrong password and tampered data are
    /// deliberately indistinguishable.
    #[error("Invalid master password")]
    Authentication,

    /// The secret store could not be read or written.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A cryptographic primitive or the OS random source is unusable.
    #[error("Cryptography unavailable: {0}")]
    CryptoUnavailable(String),

    #[error("Vault is locked")]
    Locked,

    /// Too many failed unlock attempts; the unlock flow must be restarted.
    #[error("Too many failed unlock attempts")]
    LockedOut,

    #[error("Entry not found: {0}")]
    EntryNotFound(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("User already exists: {0}")]
    UserExists(String),

    #[error("Vault already exists")]
    AlreadyExists,

    /// The stored vault changed since this session loaded it.
    #[error("Vault was modified by another writer")]
    Conflict,

    /// The blob authenticated but its contents could not be parsed.
    #[error("Vault data is unreadable: {0}")]
    Corrupted(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Stable machine-readable code for front ends.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Validation(_) => "VALIDATION",
            Error::Authentication => "AUTHENTICATION_FAILED",
            Error::Storage(_) => "STORAGE",
            Error::CryptoUnavailable(_) => "CRYPTO_UNAVAILABLE",
            Error::Locked => "LOCKED",
            Error::LockedOut => "LOCKED_OUT",
            Error::EntryNotFound(_) => "ENTRY_NOT_FOUND",
            Error::UserNotFound(_) => "USER_NOT_FOUND",
            Error::UserExists(_) => "USER_EXISTS",
            Error::AlreadyExists => "ALREADY_EXISTS",
            Error::Conflict => "CONFLICT",
            Error::Corrupted(_) => "CORRUPTED",
            Error::Config(_) => "CONFIG",
            Error::Serialization(_) => "SERIALIZATION_ERROR",
            Error::Io(_) => "IO_ERROR",
        }
    }

    /// Text suitable for an end user.
    ///
    /// Internal detail (paths, primitive names, parser positions) is dropped;
    /// validation reasons are kept because the user has to act on them.
    pub fn user_message(&self) -> String {
        match self {
            Error::Validation(reason) => reason.clone(),
            Error::Authentication => "Invalid master password".into(),
            Error::Storage(_) | Error::Io(_) => "Could not access vault storage".into(),
            Error::CryptoUnavailable(_) => "Secure cryptography is not available on this system".into(),
            Error::Locked => "Vault is locked".into(),
            Error::LockedOut => "Too many failed attempts. Start again to unlock.".into(),
            Error::EntryNotFound(_) => "Entry not found".into(),
            Error::UserNotFound(_) => "Unknown user".into(),
            Error::UserExists(_) => "Username already exists".into(),
            Error::AlreadyExists => "A vault already exists for this user".into(),
            Error::Conflict => "The vault was changed elsewhere. Unlock it again.".into(),
            Error::Corrupted(_) | Error::Serialization(_) => "Vault data is unreadable".into(),
            Error::Config(_) => "Invalid settings".into(),
        }
    }
}

impl serde::Serialize for Error {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("Error", 2)?;
        state.serialize_field("code", self.code())?;
        state.serialize_field("message", &self.user_message())?;
        state.end()
    }
}
