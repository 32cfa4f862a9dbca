//! Append-only security event log (`security.log`, JSON lines, owner-only).
//!
//! Details carry counts and entry ids only: never passwords, keys or site
//! names. Failing to write an event never fails the operation that caused it.
//! Writes run on the blocking pool.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const SECURITY_LOG_FILE_NAME: &str = "security.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecurityEventKind {
    UserRegistered,
    VaultCreated,
    VaultUnlocked,
    UnlockFailed,
    UnlockLockedOut,
    VaultLocked,
    EntryAdded,
    EntryUpdated,
    EntryDeleted,
    MasterPasswordChanged,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityEvent {
    pub timestamp: DateTime<Utc>,
    pub event_type: SecurityEventKind,
    pub username: Option<String>,
    pub success: bool,
    pub details: String,
}

#[derive(Debug, Clone, Default)]
pub struct SecurityLogger {
    log_file: Option<PathBuf>,
}

impl SecurityLogger {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            log_file: Some(data_dir.join(SECURITY_LOG_FILE_NAME)),
        }
    }

    /// A logger that drops every event.
    pub fn disabled() -> Self {
        Self { log_file: None }
    }

    /// Append one event. Errors are logged and swallowed.
    pub async fn log_event(
        &self,
        event_type: SecurityEventKind,
        username: Option<&str>,
        success: bool,
        details: &str,
    ) {
        let Some(path) = self.log_file.clone() else {
            return;
        };

        let event = SecurityEvent {
            timestamp: Utc::now(),
            event_type,
            username: username.map(|s| s.to_string()),
            success,
            details: details.to_string(),
        };

        let written = tokio::task::spawn_blocking(move || append_line(&path, &event))
            .await
            .map_err(std::io::Error::other)
            .and_then(|result| result);
        if let Err(e) = written {
            warn!("Failed to write security event {:?}: {}", event_type, e);
        }
    }
}

fn append_line(path: &Path, event: &SecurityEvent) -> std::io::Result<()> {
    let mut options = std::fs::OpenOptions::new();
    options.create(true).append(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    let json = serde_json::to_string(event).map_err(std::io::Error::other)?;
    writeln!(file, "{}", json)
}
