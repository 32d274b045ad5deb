// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process credential store.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;

use super::{CredentialStore, StoredCredentials};

struct Shared {
    creds: Mutex<StoredCredentials>,
    change_tx: broadcast::Sender<()>,
}

/// Credential store kept in memory.
///
/// Clones share the same record, so two clients built from clones of one
/// store behave like two browser tabs of the same origin: every write is
/// signalled to every subscriber.
#[derive(Clone)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_credentials(StoredCredentials::default())
    }

    pub fn with_credentials(creds: StoredCredentials) -> Self {
        let (change_tx, _) = broadcast::channel(16);
        Self { shared: Arc::new(Shared { creds: Mutex::new(creds), change_tx }) }
    }

    /// Current record, for inspection.
    pub fn snapshot(&self) -> StoredCredentials {
        self.shared.creds.lock().clone()
    }
}

impl CredentialStore for MemoryStore {
    fn load(&self) -> anyhow::Result<StoredCredentials> {
        Ok(self.snapshot())
    }

    fn save(&self, creds: &StoredCredentials) -> anyhow::Result<()> {
        *self.shared.creds.lock() = creds.clone();
        let _ = self.shared.change_tx.send(());
        Ok(())
    }

    fn clear(&self) -> anyhow::Result<()> {
        *self.shared.creds.lock() = StoredCredentials::default();
        let _ = self.shared.change_tx.send(());
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shared.change_tx.subscribe()
    }
}
