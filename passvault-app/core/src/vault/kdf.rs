//! Argon2id key derivation: master password + salt → 256-bit vault key.
//!
//! The work factor is fixed by [`KdfParams::default`]. The parameters are not
//! recorded in the sealed blob, so a vault must be opened with the same
//! parameters that sealed it.

use argon2::{Algorithm, Argon2, Params, Version};
use subtle::ConstantTimeEq;
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Error, Result};
use crate::vault::salt::SALT_SIZE;

/// Default Argon2id cost: 64 MiB, 3 passes, 4 lanes.
const ARGON2_MEMORY_COST: u32 = 65536; // 64 MB in KiB
const ARGON2_TIME_COST: u32 = 3;
const ARGON2_PARALLELISM: u32 = 4;

/// Derived key length: 256 bits for AES-256.
pub const KEY_SIZE: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub m_cost: u32,
    /// Number of passes.
    pub t_cost: u32,
    /// Degree of parallelism.
    pub p_cost: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            m_cost: ARGON2_MEMORY_COST,
            t_cost: ARGON2_TIME_COST,
            p_cost: ARGON2_PARALLELISM,
        }
    }
}

/// A 256-bit encryption key with automatic zeroization on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct VaultKey {
    key: [u8; KEY_SIZE],
}

impl VaultKey {
    pub fn from_bytes(key: [u8; KEY_SIZE]) -> Self {
        Self { key }
    }

    /// Get the key as a byte slice for cryptographic operations.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.key
    }
}

impl std::fmt::Debug for VaultKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never log the actual key material
        f.debug_struct("VaultKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// The user's master password, wiped from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterSecret {
    secret: String,
}

impl MasterSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.secret
    }

    pub fn len(&self) -> usize {
        self.secret.len()
    }

    pub fn is_empty(&self) -> bool {
        self.secret.is_empty()
    }

    /// Constant-time comparison against a candidate password.
    pub fn matches(&self, candidate: &str) -> bool {
        self.secret.as_bytes().ct_eq(candidate.as_bytes()).into()
    }
}

impl From<String> for MasterSecret {
    fn from(secret: String) -> Self {
        Self::new(secret)
    }
}

impl From<&str> for MasterSecret {
    fn from(secret: &str) -> Self {
        Self::new(secret)
    }
}

impl std::fmt::Debug for MasterSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterSecret")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Derive a vault key from the master password using Argon2id.
///
/// Fails with [`Error::CryptoUnavailable`] if the parameters are rejected or
/// Argon2 cannot run; there is no weaker fallback.
pub fn derive_key(secret: &MasterSecret, salt: &[u8; SALT_SIZE], params: &KdfParams) -> Result<VaultKey> {
    let argon2_params = Params::new(params.m_cost, params.t_cost, params.p_cost, Some(KEY_SIZE))
        .map_err(|e| Error::CryptoUnavailable(format!("Invalid Argon2 params: {}", e)))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut key_bytes = [0u8; KEY_SIZE];
    argon2
        .hash_password_into(secret.as_str().as_bytes(), salt, &mut key_bytes)
        .map_err(|e| Error::CryptoUnavailable(format!("Key derivation failed: {}", e)))?;

    let key = VaultKey::from_bytes(key_bytes);
    key_bytes.zeroize();

    debug!(m_cost = params.m_cost, t_cost = params.t_cost, "Derived {}-byte vault key", KEY_SIZE);
    Ok(key)
}

#[cfg(test)]
pub(crate) fn test_params() -> KdfParams {
    KdfParams {
        m_cost: 256,
        t_cost: 1,
        p_cost: 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_key_deterministic() {
        let salt = [1u8; SALT_SIZE];
        let secret = MasterSecret::from("correct horse");
        let key1 = derive_key(&secret, &salt, &test_params()).unwrap();
        let key2 = derive_key(&secret, &salt, &test_params()).unwrap();

        assert_eq!(key1.as_bytes(), key2.as_bytes(), "Same password and salt should produce same key");
        assert_eq!(key1.as_bytes().len(), KEY_SIZE);
    }

    #[test]
    fn test_derive_key_different_passwords() {
        let salt = [1u8; SALT_SIZE];
        let key1 = derive_key(&"one".into(), &salt, &test_params()).unwrap();
        let key2 = derive_key(&"two".into(), &salt, &test_params()).unwrap();
        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_derive_key_different_salts() {
        let secret = MasterSecret::from("same");
        let key1 = derive_key(&secret, &[1u8; SALT_SIZE], &test_params()).unwrap();
        let key2 = derive_key(&secret, &[2u8; SALT_SIZE], &test_params()).unwrap();
        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_invalid_params_fail_loudly() {
        let params = KdfParams {
            m_cost: 1,
            t_cost: 0,
            p_cost: 1,
        };
        let err = derive_key(&"pw".into(), &[0u8; SALT_SIZE], &params).unwrap_err();
        assert!(matches!(err, Error::CryptoUnavailable(_)));
    }

    #[test]
    fn test_default_work_factor() {
        let params = KdfParams::default();
        assert_eq!(params.m_cost, 65536);
        assert_eq!(params.t_cost, 3);
        assert_eq!(params.p_cost, 4);
    }

    #[test]
    fn test_debug_output_is_redacted() {
        let secret = MasterSecret::from("hunter2");
        let key = VaultKey::from_bytes([7u8; KEY_SIZE]);
        assert!(!format!("{:?}", secret).contains("hunter2"));
        assert!(format!("{:?}", key).contains("REDACTED"));
    }

    #[test]
    fn test_master_secret_matches() {
        let secret = MasterSecret::from("hunter2");
        assert!(secret.matches("hunter2"));
        assert!(!secret.matches("hunter3"));
        assert!(!secret.matches("hunter22"));
    }
}
