//! AES-256-GCM sealing of the vault container.
//!
//! Persisted layout, base64 encoded as one string:
//!
//! ```text
//! [32-byte salt][12-byte nonce][ciphertext][16-byte auth tag]
//! ```
//!
//! The salt is only carried for the caller's KDF step; this module never
//! derives keys itself.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::Engine;
use tracing::debug;
use zeroize::Zeroizing;

use crate::error::{Error, Result};
use crate::vault::kdf::VaultKey;
use crate::vault::salt::{fill_random, SALT_SIZE};

/// Nonce size for AES-GCM (96 bits = 12 bytes)
pub const NONCE_SIZE: usize = 12;

/// Authentication tag size for AES-GCM (128 bits)
pub const TAG_SIZE: usize = 16;

/// Smallest well-formed blob: an empty plaintext still carries a tag.
pub const MIN_BLOB_SIZE: usize = SALT_SIZE + NONCE_SIZE + TAG_SIZE;

/// A sealed vault: salt, nonce and ciphertext with its appended tag.
#[derive(Clone, PartialEq, Eq)]
pub struct SealedBlob {
    salt: [u8; SALT_SIZE],
    nonce: [u8; NONCE_SIZE],
    ciphertext: Vec<u8>,
}

impl SealedBlob {
    pub fn salt(&self) -> &[u8; SALT_SIZE] {
        &self.salt
    }

    pub fn nonce(&self) -> &[u8; NONCE_SIZE] {
        &self.nonce
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(SALT_SIZE + NONCE_SIZE + self.ciphertext.len());
        out.extend_from_slice(&self.salt);
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Split raw bytes by the fixed-width prefixes.
    ///
    /// A truncated blob cannot be told apart from a tampered one, so it is
    /// reported as [`Error::Authentication`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < MIN_BLOB_SIZE {
            debug!("Rejecting sealed blob of {} bytes", bytes.len());
            return Err(Error::Authentication);
        }

        let (salt_bytes, rest) = bytes.split_at(SALT_SIZE);
        let (nonce_bytes, ciphertext) = rest.split_at(NONCE_SIZE);

        let mut salt = [0u8; SALT_SIZE];
        salt.copy_from_slice(salt_bytes);
        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(nonce_bytes);

        Ok(Self {
            salt,
            nonce,
            ciphertext: ciphertext.to_vec(),
        })
    }

    /// Encode for the secret store.
    pub fn encode(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.to_bytes())
    }

    pub fn decode(encoded: &str) -> Result<Self> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|_| Error::Authentication)?;
        Self::from_bytes(&bytes)
    }
}

impl std::fmt::Debug for SealedBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SealedBlob")
            .field("ciphertext_len", &self.ciphertext.len())
            .finish()
    }
}

fn cipher_for(key: &VaultKey) -> Result<Aes256Gcm> {
    Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| Error::CryptoUnavailable(format!("Invalid key: {}", e)))
}

/// Encrypt `plaintext` under `key` with a fresh random nonce.
///
/// `salt` must be the salt `key` was derived from.
pub fn seal(plaintext: &[u8], salt: &[u8; SALT_SIZE], key: &VaultKey) -> Result<SealedBlob> {
    let cipher = cipher_for(key)?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    fill_random(&mut nonce_bytes)?;

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|e| Error::CryptoUnavailable(format!("Encryption failed: {}", e)))?;

    debug!("Sealed {} plaintext bytes", plaintext.len());
    Ok(SealedBlob {
        salt: *salt,
        nonce: nonce_bytes,
        ciphertext,
    })
}

/// Decrypt a sealed blob.
///
/// Any tag failure is [`Error::Authentication`]; no plaintext is returned.
pub fn open(blob: &SealedBlob, key: &VaultKey) -> Result<Zeroizing<Vec<u8>>> {
    let cipher = cipher_for(key)?;

    let plaintext = cipher
        .decrypt(Nonce::from_slice(&blob.nonce), blob.ciphertext.as_ref())
        // Decryption failure = wrong key or corrupted blob
        .map_err(|_| Error::Authentication)?;

    Ok(Zeroizing::new(plaintext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::kdf::{derive_key, test_params, MasterSecret};
    use crate::vault::salt::generate_salt;

    fn key_for(password: &str, salt: &[u8; SALT_SIZE]) -> VaultKey {
        derive_key(&MasterSecret::from(password), salt, &test_params()).unwrap()
    }

    #[test]
    fn test_seal_open_round_trip() {
        let salt = generate_salt().unwrap();
        let key = key_for("master", &salt);

        let blob = seal(b"{\"entries\":[]}", &salt, &key).unwrap();
        let decoded = SealedBlob::decode(&blob.encode()).unwrap();
        let rekey = key_for("master", decoded.salt());

        assert_eq!(open(&decoded, &rekey).unwrap().as_slice(), b"{\"entries\":[]}");
    }

    #[test]
    fn test_layout() {
        let salt = [9u8; SALT_SIZE];
        let key = key_for("master", &salt);
        let blob = seal(b"abc", &salt, &key).unwrap();
        let bytes = blob.to_bytes();

        assert_eq!(bytes.len(), SALT_SIZE + NONCE_SIZE + 3 + TAG_SIZE);
        assert_eq!(&bytes[..SALT_SIZE], &salt);
        assert_eq!(&bytes[SALT_SIZE..SALT_SIZE + NONCE_SIZE], blob.nonce());
    }

    #[test]
    fn test_fresh_nonce_per_seal() {
        let salt = generate_salt().unwrap();
        let key = key_for("master", &salt);
        let a = seal(b"same", &salt, &key).unwrap();
        let b = seal(b"same", &salt, &key).unwrap();
        assert_ne!(a.nonce(), b.nonce());
        assert_ne!(a.encode(), b.encode());
    }

    #[test]
    fn test_wrong_key_is_authentication_error() {
        let salt = generate_salt().unwrap();
        let blob = seal(b"secret", &salt, &key_for("right", &salt)).unwrap();
        let err = open(&blob, &key_for("wrong", &salt)).unwrap_err();
        assert!(matches!(err, Error::Authentication));
    }

    #[test]
    fn test_any_tampered_byte_fails() {
        let salt = generate_salt().unwrap();
        let key = key_for("master", &salt);
        let bytes = seal(b"tamper me", &salt, &key).unwrap().to_bytes();

        for i in SALT_SIZE..bytes.len() {
            let mut tampered = bytes.clone();
            tampered[i] ^= 0x01;
            let blob = SealedBlob::from_bytes(&tampered).unwrap();
            assert!(
                matches!(open(&blob, &key), Err(Error::Authentication)),
                "flipping byte {} should fail authentication",
                i
            );
        }
    }

    #[test]
    fn test_truncated_or_garbage_blob_is_generic_failure() {
        assert!(matches!(SealedBlob::decode("AAAA"), Err(Error::Authentication)));
        assert!(matches!(SealedBlob::decode("not base64!!"), Err(Error::Authentication)));
        assert!(matches!(
            SealedBlob::from_bytes(&[0u8; MIN_BLOB_SIZE - 1]),
            Err(Error::Authentication)
        ));
    }
}
