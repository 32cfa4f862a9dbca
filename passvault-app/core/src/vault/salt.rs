//! Salt and nonce material from the OS random source.
//!
//! Every save draws a fresh 32-byte salt, so no salt is ever reused across
//! sealed blobs. If the OS generator fails we surface the error; there is no
//! fallback to a userspace PRNG.

use rand::rngs::OsRng;
use rand::TryRngCore;

use crate::error::{Error, Result};

/// Salt size in bytes (256 bits)
pub const SALT_SIZE: usize = 32;

/// Fill `buf` from the operating system CSPRNG.
pub fn fill_random(buf: &mut [u8]) -> Result<()> {
    OsRng
        .try_fill_bytes(buf)
        .map_err(|e| Error::CryptoUnavailable(format!("OS random source failed: {}", e)))
}

/// Draw a uniformly distributed `u32` from the OS CSPRNG.
pub fn random_u32() -> Result<u32> {
    OsRng
        .try_next_u32()
        .map_err(|e| Error::CryptoUnavailable(format!("OS random source failed: {}", e)))
}

/// Generate a new random salt.
pub fn generate_salt() -> Result<[u8; SALT_SIZE]> {
    let mut salt = [0u8; SALT_SIZE];
    fill_random(&mut salt)?;
    Ok(salt)
}
