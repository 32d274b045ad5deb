// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON file credential store with atomic writes and change watching.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{CredentialStore, StoredCredentials};

/// Credential document on disk.
///
/// Every process pointing at the same path shares one session; run
/// [`FileStore::spawn_watcher`] to hear about writes made by the others.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    change_tx: broadcast::Sender<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let (change_tx, _) = broadcast::channel(16);
        Self { path: path.into(), change_tx }
    }

    /// Store at [`default_credentials_path`](super::default_credentials_path).
    pub fn at_default_location() -> Self {
        Self::new(super::default_credentials_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_bytes(&self) -> anyhow::Result<Vec<u8>> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Watch the document for changes, signalling subscribers whenever its
    /// bytes differ from the last observed version.
    ///
    /// Uses `notify` on the parent directory with a polling fallback. Runs
    /// until `shutdown` is cancelled.
    pub fn spawn_watcher(
        &self,
        poll_interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let path = self.path.clone();
        let change_tx = self.change_tx.clone();
        let mut last_seen = self.read_bytes().unwrap_or_default();

        tokio::spawn(async move {
            let (wake_tx, mut wake_rx) = mpsc::channel::<()>(1);
            let _watcher = setup_notify_watcher(&path, wake_tx);
            let mut poll = tokio::time::interval(poll_interval);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = wake_rx.recv() => {}
                    _ = poll.tick() => {}
                }

                let current = match std::fs::read(&path) {
                    Ok(bytes) => bytes,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
                    Err(e) => {
                        tracing::debug!(path = %path.display(), err = %e, "credential read failed");
                        continue;
                    }
                };
                if current != last_seen {
                    last_seen = current;
                    tracing::debug!(path = %path.display(), "credential file changed");
                    let _ = change_tx.send(());
                }
            }
        })
    }
}

/// Watch the document's parent directory so creation and rename-over are
/// seen too. Returns the watcher handle, which must be kept alive.
fn setup_notify_watcher(
    path: &Path,
    wake_tx: mpsc::Sender<()>,
) -> Option<notify::RecommendedWatcher> {
    use notify::{RecursiveMode, Watcher};

    let mut watcher = notify::recommended_watcher(move |_: notify::Result<notify::Event>| {
        let _ = wake_tx.try_send(());
    })
    .ok()?;

    let watch_path = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    watcher.watch(watch_path, RecursiveMode::NonRecursive).ok()?;

    Some(watcher)
}

impl CredentialStore for FileStore {
    fn load(&self) -> anyhow::Result<StoredCredentials> {
        let bytes = self.read_bytes()?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(StoredCredentials::default());
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Write tmp + rename.
    ///
    /// The temp name is unique per process and call so concurrent saves never
    /// share a `.tmp` file (a shorter write would leave trailing bytes of a
    /// longer one).
    fn save(&self, creds: &StoredCredentials) -> anyhow::Result<()> {
        static COUNTER: AtomicU32 = AtomicU32::new(0);

        if let Some(dir) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(creds)?;
        let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
        let tmp_name = format!(
            "{}.{}.{}.tmp",
            self.path.file_name().unwrap_or_default().to_string_lossy(),
            std::process::id(),
            seq,
        );
        let tmp_path = self.path.with_file_name(tmp_name);
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn clear(&self) -> anyhow::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<()> {
        self.change_tx.subscribe()
    }
}

#[cfg(test)]
#[path = "file_tests.rs"]
mod tests;
