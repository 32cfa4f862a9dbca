//! Plaintext vault container: the JSON document that gets sealed as a whole.
//!
//! ```json
//! {"entries":[{"id":"…","site":"…","username":"…","password":"…",
//!              "createdAt":"…","updatedAt":"…"}],
//!  "lastModified":"2026-01-01T00:00:00Z","version":"2"}
//! ```
//!
//! Older layouts are still accepted on read: objects without `version` are the
//! version 1 schema, and a bare array of `{site, username, password}` is the
//! original unversioned format.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Error, Result};

/// Schema written by this version.
pub const CURRENT_VERSION: &str = "2";
/// Versioned object without an explicit `version` field.
pub const OLDEST_VERSION: &str = "1";
/// Bare JSON array with no ids or timestamps.
pub const LEGACY_ARRAY_VERSION: &str = "0";

pub const MAX_FIELD_LENGTH: usize = 100;
pub const MAX_PASSWORD_LENGTH: usize = 1024;

/// One stored credential.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultEntry {
    pub id: String,
    pub site: String,
    pub username: String,
    pub password: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VaultEntry {
    /// Create an entry with a fresh id. Fields are assumed validated.
    pub fn new(site: String, username: String, password: String) -> Self {
        let now = Utc::now();
        Self {
            id: new_entry_id(),
            site,
            username,
            password,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply an update in place. Returns `false` if nothing changed.
    pub fn apply(&mut self, update: &EntryUpdate) -> bool {
        let mut changed = false;
        if let Some(site) = &update.site {
            if *site != self.site {
                self.site = site.clone();
                changed = true;
            }
        }
        if let Some(username) = &update.username {
            if *username != self.username {
                self.username = username.clone();
                changed = true;
            }
        }
        if let Some(password) = &update.password {
            if *password != self.password {
                self.password.zeroize();
                self.password = password.clone();
                changed = true;
            }
        }
        if changed {
            self.updated_at = next_timestamp(self.updated_at);
        }
        changed
    }

    /// Case-insensitive substring match on site or username.
    /// `needle` must already be lowercase.
    pub fn matches(&self, needle: &str) -> bool {
        self.site.to_lowercase().contains(needle) || self.username.to_lowercase().contains(needle)
    }
}

impl Drop for VaultEntry {
    fn drop(&mut self) {
        self.password.zeroize();
    }
}

impl std::fmt::Debug for VaultEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultEntry")
            .field("id", &self.id)
            .field("site", &self.site)
            .field("username", &self.username)
            .field("password", &"[HIDDEN]")
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

impl std::fmt::Display for VaultEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Site: {}, Username: {}, Password: [HIDDEN]", self.site, self.username)
    }
}

/// Fields for a new entry.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct NewEntry {
    pub site: String,
    pub username: String,
    pub password: String,
}

impl NewEntry {
    pub fn new(site: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            site: site.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    /// Validate and build the stored entry.
    pub fn into_entry(self) -> Result<VaultEntry> {
        let site = validate_field("site", &self.site)?;
        let username = validate_field("username", &self.username)?;
        validate_password_field(&self.password)?;
        Ok(VaultEntry::new(site, username, self.password.clone()))
    }
}

/// Partial update; `None` leaves the field as is.
#[derive(Clone, Default)]
pub struct EntryUpdate {
    pub site: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl EntryUpdate {
    pub fn is_empty(&self) -> bool {
        self.site.is_none() && self.username.is_none() && self.password.is_none()
    }

    /// Validate present fields, trimming site and username.
    pub fn validated(&self) -> Result<EntryUpdate> {
        if self.is_empty() {
            return Err(Error::Validation("Nothing to update".into()));
        }
        let site = self.site.as_deref().map(|s| validate_field("site", s)).transpose()?;
        let username = self
            .username
            .as_deref()
            .map(|u| validate_field("username", u))
            .transpose()?;
        if let Some(password) = &self.password {
            validate_password_field(password)?;
        }
        Ok(EntryUpdate {
            site,
            username,
            password: self.password.clone(),
        })
    }
}

/// Validate a site or username field and return it trimmed.
pub fn validate_field(name: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::Validation(format!("{} cannot be empty", name)));
    }
    if value.chars().count() > MAX_FIELD_LENGTH {
        return Err(Error::Validation(format!(
            "{} is too long (max {} characters)",
            name, MAX_FIELD_LENGTH
        )));
    }
    if value.chars().any(|c| c.is_control()) {
        return Err(Error::Validation(format!("{} contains invalid characters", name)));
    }
    Ok(value.to_string())
}

pub fn validate_password_field(password: &str) -> Result<()> {
    if password.is_empty() {
        return Err(Error::Validation("password cannot be empty".into()));
    }
    if password.chars().count() > MAX_PASSWORD_LENGTH {
        return Err(Error::Validation(format!(
            "password is too long (max {} characters)",
            MAX_PASSWORD_LENGTH
        )));
    }
    if password.contains('\0') {
        return Err(Error::Validation("password contains a null character".into()));
    }
    Ok(())
}

pub fn validate_query(query: &str) -> Result<()> {
    if query.chars().count() > MAX_FIELD_LENGTH {
        return Err(Error::Validation(format!(
            "search query is too long (max {} characters)",
            MAX_FIELD_LENGTH
        )));
    }
    Ok(())
}

fn new_entry_id() -> String {
    Uuid::new_v4().to_string()
}

/// `now`, but strictly after `previous` even on a coarse clock.
fn next_timestamp(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > previous {
        now
    } else {
        previous + Duration::microseconds(1)
    }
}

/// Everything that gets sealed.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultContainer {
    pub entries: Vec<VaultEntry>,
    pub last_modified: DateTime<Utc>,
    pub version: String,
}

impl VaultContainer {
    /// Container for a save happening now.
    pub fn for_save(entries: Vec<VaultEntry>) -> Self {
        Self {
            entries,
            last_modified: Utc::now(),
            version: CURRENT_VERSION.to_string(),
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse any known layout, repairing missing or duplicate ids.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let stored: StoredContainer =
            serde_json::from_slice(bytes).map_err(|e| Error::Corrupted(e.to_string()))?;

        let (raw_entries, last_modified, version) = match stored {
            StoredContainer::Legacy(entries) => (entries, None, LEGACY_ARRAY_VERSION.to_string()),
            StoredContainer::Versioned(container) => (
                container.entries,
                container.last_modified,
                container.version.unwrap_or_else(|| OLDEST_VERSION.to_string()),
            ),
        };

        let now = Utc::now();
        let mut seen = HashSet::with_capacity(raw_entries.len());
        let mut reassigned = 0usize;
        let entries: Vec<VaultEntry> = raw_entries
            .into_iter()
            .map(|mut raw| {
                let id = match raw.id.take() {
                    Some(id) if !id.is_empty() && !seen.contains(&id) => id,
                    Some(_) => {
                        reassigned += 1;
                        new_entry_id()
                    }
                    None => new_entry_id(),
                };
                seen.insert(id.clone());
                let created_at = raw.created_at.unwrap_or(now);
                VaultEntry {
                    id,
                    site: std::mem::take(&mut raw.site),
                    username: std::mem::take(&mut raw.username),
                    password: std::mem::take(&mut raw.password),
                    created_at,
                    updated_at: raw.updated_at.unwrap_or(created_at),
                }
            })
            .collect();

        if reassigned > 0 {
            warn!("Reassigned {} duplicate entry ids while loading vault", reassigned);
        }
        debug!(version = %version, "Parsed vault container with {} entries", entries.len());

        Ok(Self {
            entries,
            last_modified: last_modified.unwrap_or(now),
            version,
        })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredContainer {
    Legacy(Vec<RawEntry>),
    Versioned(RawContainer),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawContainer {
    #[serde(default)]
    entries: Vec<RawEntry>,
    #[serde(default)]
    last_modified: Option<DateTime<Utc>>,
    #[serde(default)]
    version: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEntry {
    #[serde(default)]
    id: Option<String>,
    site: String,
    username: String,
    password: String,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

impl Drop for RawEntry {
    fn drop(&mut self) {
        self.password.zeroize();
    }
}
