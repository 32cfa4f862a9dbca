//! User-editable settings in `settings.json`.
//!
//! Only presentation and logging knobs live here. The Argon2id work factor
//! and the unlock attempt threshold are fixed in code, and a file that names
//! either one is rejected rather than silently ignored.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::write_private_file;
use crate::error::{Error, Result};
use crate::security::generator::{DEFAULT_LENGTH, MAX_LENGTH, MIN_LENGTH};
use crate::security::strength::DEFAULT_GUESSES_PER_SECOND;

pub const SETTINGS_FILE_NAME: &str = "settings.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VaultSettings {
    pub default_password_length: usize,
    /// Attacker guess rate assumed for crack-time estimates.
    pub guesses_per_second: f64,
    /// Append security events to `security.log`.
    pub audit_log: bool,
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self {
            default_password_length: DEFAULT_LENGTH,
            guesses_per_second: DEFAULT_GUESSES_PER_SECOND,
            audit_log: true,
        }
    }
}

impl VaultSettings {
    /// Check value ranges.
    ///
    /// # Errors
    /// [`Error::Config`] naming the first field that is out of range.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_LENGTH..=MAX_LENGTH).contains(&self.default_password_length) {
            return Err(Error::Config(format!(
                "default_password_length must be between {} and {}",
                MIN_LENGTH, MAX_LENGTH
            )));
        }
        if !(self.guesses_per_second.is_finite() && self.guesses_per_second > 0.0) {
            return Err(Error::Config("guesses_per_second must be positive".into()));
        }
        Ok(())
    }
}

fn get_settings_path(data_dir: &Path) -> PathBuf {
    data_dir.join(SETTINGS_FILE_NAME)
}

/// Read `settings.json` from `data_dir`, or the defaults if it does not exist.
///
/// # Errors
/// [`Error::Config`] for malformed JSON, unknown fields or invalid values.
pub fn load_settings(data_dir: &Path) -> Result<VaultSettings> {
    let path = get_settings_path(data_dir);

    if !path.exists() {
        return Ok(VaultSettings::default());
    }

    let content = std::fs::read_to_string(&path)?;
    let settings: VaultSettings =
        serde_json::from_str(&content).map_err(|e| Error::Config(format!("Invalid settings file: {}", e)))?;
    settings.validate()?;
    Ok(settings)
}

pub fn save_settings(data_dir: &Path, settings: &VaultSettings) -> Result<()> {
    settings.validate()?;
    let content = serde_json::to_string_pretty(settings)?;
    write_private_file(&get_settings_path(data_dir), content.as_bytes())?;
    Ok(())
}
