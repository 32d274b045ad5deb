// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential store: the durable mirror of the session.
//!
//! The store is not an owner. Only the session controller writes to it, and
//! only together with the matching in-memory update. Writes made by other
//! contexts sharing the same backing (another process on the same file,
//! another clone of a [`MemoryStore`]) are announced through
//! [`CredentialStore::subscribe`] so every context converges on the same
//! tokens.

pub mod file;
pub mod memory;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::session::UserProfile;

pub use file::FileStore;
pub use memory::MemoryStore;

/// File name of the credential document inside the state directory.
pub const CREDENTIALS_FILE: &str = "credentials.json";

/// The persisted key-value record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredCredentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserProfile>,
}

impl StoredCredentials {
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none() && self.user.is_none()
    }
}

/// Durable key-value storage for the session tokens.
pub trait CredentialStore: Send + Sync {
    /// Read the current record. A store that never held credentials loads
    /// as [`StoredCredentials::default`].
    fn load(&self) -> anyhow::Result<StoredCredentials>;

    /// Replace the stored record.
    fn save(&self, creds: &StoredCredentials) -> anyhow::Result<()>;

    /// Remove every stored token and the cached identity.
    fn clear(&self) -> anyhow::Result<()>;

    /// Signals whenever the backing record may have changed, including
    /// changes made by other contexts.
    fn subscribe(&self) -> broadcast::Receiver<()>;
}

/// Resolve the state directory for client data.
///
/// Checks `BOTDASH_STATE_DIR`, then `$XDG_STATE_HOME/botdash`,
/// then `$HOME/.local/state/botdash`.
pub fn state_dir() -> PathBuf {
    state_dir_with(|name| std::env::var(name).ok())
}

/// [`state_dir`] with an injectable environment lookup.
pub fn state_dir_with(env: impl Fn(&str) -> Option<String>) -> PathBuf {
    if let Some(dir) = env("BOTDASH_STATE_DIR") {
        return PathBuf::from(dir);
    }
    if let Some(xdg) = env("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join("botdash");
    }
    if let Some(home) = env("HOME") {
        return PathBuf::from(home).join(".local/state/botdash");
    }
    PathBuf::from(".botdash")
}

/// Default location of the credential document.
pub fn default_credentials_path() -> PathBuf {
    state_dir().join(CREDENTIALS_FILE)
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
