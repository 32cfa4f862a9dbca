//! PassVault core: an offline, per-user password vault.
//!
//! A vault is a list of site/username/password entries sealed as one blob
//! with AES-256-GCM under a key derived from the master password by
//! Argon2id. [`VaultSession`] is the entry point for front ends.

pub mod error;
pub mod security;
pub mod session;
pub mod storage;
pub mod vault;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub use error::{Error, Result};
pub use session::VaultSession;
pub use storage::{Account, SecretStore, UserRegistry, VaultSettings};
pub use vault::{EntryUpdate, MasterSecret, NewEntry, VaultEntry, VaultStatus};

#[cfg(debug_assertions)]
const DEFAULT_LOG_FILTER: &str = "passvault_core=debug";
#[cfg(not(debug_assertions))]
const DEFAULT_LOG_FILTER: &str = "passvault_core=warn";

/// Install the global tracing subscriber. `RUST_LOG` overrides the default
/// filter. Calling it twice is harmless.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
