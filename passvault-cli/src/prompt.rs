//! Password input from `PASSVAULT_MASTER_PASSWORD` or the terminal.

use std::io::IsTerminal;

use anyhow::{bail, Context, Result};
use passvault_core::MasterSecret;
use zeroize::Zeroizing;

pub const MASTER_PASSWORD_ENV: &str = "PASSVAULT_MASTER_PASSWORD";

fn master_from_env() -> Option<MasterSecret> {
    std::env::var(MASTER_PASSWORD_ENV)
        .ok()
        .filter(|value| !value.is_empty())
        .map(MasterSecret::from)
}

/// Whether the master password comes from the environment, in which case
/// re-prompting after a failure would just repeat the same guess.
pub fn master_password_from_env() -> bool {
    master_from_env().is_some()
}

/// Read a line from the terminal without echo.
pub fn read_secret(prompt: &str) -> Result<Zeroizing<String>> {
    if !std::io::stdin().is_terminal() {
        bail!("No terminal available to read a password");
    }
    let value = rpassword::prompt_password(prompt).context("Failed to read password")?;
    Ok(Zeroizing::new(value))
}

pub fn read_master_password() -> Result<MasterSecret> {
    if let Some(secret) = master_from_env() {
        return Ok(secret);
    }
    if !std::io::stdin().is_terminal() {
        bail!(
            "No master password provided. Set {} or run interactively.",
            MASTER_PASSWORD_ENV
        );
    }

    let value = read_secret("Master password: ")?;
    if value.is_empty() {
        bail!("Master password cannot be empty");
    }
    Ok(MasterSecret::new(value.as_str()))
}

/// Prompt twice for a new master password. With `allow_env` the environment
/// variable is used as is, without confirmation.
pub fn read_new_master_password(label: &str, allow_env: bool) -> Result<MasterSecret> {
    if allow_env {
        if let Some(secret) = master_from_env() {
            return Ok(secret);
        }
    }

    let first = read_secret(&format!("{}: ", label))?;
    let second = read_secret(&format!("Confirm {}: ", label.to_lowercase()))?;
    if *first != *second {
        bail!("Passwords do not match");
    }
    Ok(MasterSecret::new(first.as_str()))
}
