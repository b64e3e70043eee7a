//! Atomic state file and the background saver
//!
//! [`PersistenceManager`] owns the state file. Every save serializes the whole
//! [`PersistedState`] to `<file>.tmp` next to the target, fsyncs it, and renames
//! it over the target, so readers only ever see a complete old or new file.
//! Saves are serialized by an async mutex.
//!
//! [`Saver`] owns the schedule. Stores request saves through a cloneable
//! [`SaveHandle`]; the saver coalesces requests inside a debounce window,
//! saves on a fixed interval regardless, and answers `flush()` on shutdown.

use crate::error::{Result, StorageError};
use crate::state::PersistedState;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};

/// Reads and writes the state file
pub struct PersistenceManager {
    path: PathBuf,
    io_lock: Mutex<()>,
}

impl PersistenceManager {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            io_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map_or_else(|| OsString::from("state"), OsString::from);
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Write `state` atomically
    pub async fn save(&self, state: &PersistedState) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(state)?;
        let _guard = self.io_lock.lock().await;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let tmp = self.tmp_path();
        let mut file = fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&tmp, &self.path).await?;

        debug!(
            path = %self.path.display(),
            bytes = bytes.len(),
            "State saved"
        );
        Ok(())
    }

    /// Read the state file.
    ///
    /// A missing or empty file yields the default state.
    pub async fn load(&self) -> Result<PersistedState> {
        let _guard = self.io_lock.lock().await;

        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No state file, starting fresh");
                return Ok(PersistedState::default());
            }
            Err(e) => return Err(e.into()),
        };

        if content.trim().is_empty() {
            return Ok(PersistedState::default());
        }

        let state: PersistedState = serde_json::from_str(&content)?;
        state.validate()?;
        Ok(state)
    }

    /// Load, degrading to the default state on any failure
    pub async fn load_or_default(&self) -> PersistedState {
        match self.load().await {
            Ok(state) => state,
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "State file unusable, starting with empty state"
                );
                PersistedState::default()
            }
        }
    }
}

/// Produces the state to write on each save
#[async_trait]
pub trait StateSource: Send + Sync {
    async fn snapshot(&self) -> PersistedState;
}

enum SaverMessage {
    Request,
    Flush(oneshot::Sender<Result<()>>),
}

/// Cloneable handle used to ask the saver for a save
#[derive(Clone)]
pub struct SaveHandle {
    tx: mpsc::UnboundedSender<SaverMessage>,
}

/// Receiving end of a [`SaveHandle`], consumed by [`Saver::spawn`]
pub struct SaveRequests {
    rx: mpsc::UnboundedReceiver<SaverMessage>,
}

impl SaveHandle {
    /// Create a handle and the request stream a saver will drain
    pub fn channel() -> (Self, SaveRequests) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, SaveRequests { rx })
    }

    /// Handle with no saver behind it; requests are discarded
    pub fn detached() -> Self {
        Self::channel().0
    }

    /// Ask for a debounced save. Never blocks.
    pub fn request_save(&self) {
        if self.tx.send(SaverMessage::Request).is_err() {
            trace!("Saver stopped, dropping save request");
        }
    }

    /// Save immediately and wait for the result
    pub async fn flush(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SaverMessage::Flush(reply))
            .map_err(|_| StorageError::SaverStopped)?;
        rx.await.map_err(|_| StorageError::SaverStopped)?
    }
}

/// Saver timing
#[derive(Debug, Clone, Copy)]
pub struct SaverConfig {
    /// Quiet period after the first request before writing
    pub debounce: Duration,
    /// Unconditional save period
    pub interval: Duration,
}

impl Default for SaverConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_secs(2),
            interval: Duration::from_secs(14 * 60),
        }
    }
}

/// Background task that performs all saves
pub struct Saver {
    manager: Arc<PersistenceManager>,
    source: Arc<dyn StateSource>,
    config: SaverConfig,
}

impl Saver {
    pub fn new(
        manager: Arc<PersistenceManager>,
        source: Arc<dyn StateSource>,
        config: SaverConfig,
    ) -> Self {
        Self {
            manager,
            source,
            config,
        }
    }

    /// Run until every [`SaveHandle`] is dropped, then save once more if a
    /// request was pending
    pub fn spawn(self, requests: SaveRequests) -> JoinHandle<()> {
        tokio::spawn(self.run(requests.rx))
    }

    async fn run(self, mut rx: mpsc::UnboundedReceiver<SaverMessage>) {
        let mut interval =
            tokio::time::interval_at(Instant::now() + self.config.interval, self.config.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut deadline: Option<Instant> = None;

        info!(
            path = %self.manager.path().display(),
            debounce_ms = self.config.debounce.as_millis() as u64,
            interval_secs = self.config.interval.as_secs(),
            "Saver started"
        );

        loop {
            let pending = deadline;
            let debounce = async move {
                match pending {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                message = rx.recv() => match message {
                    Some(SaverMessage::Request) => {
                        if deadline.is_none() {
                            deadline = Some(Instant::now() + self.config.debounce);
                        }
                    }
                    Some(SaverMessage::Flush(reply)) => {
                        let result = self.save_once().await;
                        if result.is_ok() {
                            deadline = None;
                        }
                        if reply.send(result).is_err() {
                            trace!("Flush requester went away");
                        }
                    }
                    None => {
                        if deadline.is_some() {
                            // Best effort; the error is already logged
                            self.save_once().await.ok();
                        }
                        break;
                    }
                },
                () = debounce => {
                    deadline = match self.save_once().await {
                        Ok(()) => None,
                        Err(_) => Some(Instant::now() + self.config.debounce),
                    };
                }
                _ = interval.tick() => {
                    if self.save_once().await.is_ok() {
                        deadline = None;
                    }
                }
            }
        }

        info!("Saver stopped");
    }

    async fn save_once(&self) -> Result<()> {
        let state = self.source.snapshot().await;
        self.manager.save(&state).await.map_err(|e| {
            error!(
                path = %self.manager.path().display(),
                error = %e,
                "Failed to save state"
            );
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn save_leaves_no_tmp_file() {
        let dir = TempDir::new().unwrap();
        let manager = PersistenceManager::new(dir.path().join("data.json"));

        manager.save(&PersistedState::default()).await.unwrap();

        assert!(dir.path().join("data.json").exists());
        assert!(!dir.path().join("data.json.tmp").exists());
    }

    #[tokio::test]
    async fn missing_and_empty_files_load_default() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");
        let manager = PersistenceManager::new(&path);

        assert_eq!(manager.load().await.unwrap(), PersistedState::default());

        std::fs::write(&path, "  \n").unwrap();
        assert_eq!(manager.load().await.unwrap(), PersistedState::default());
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error_but_degrades() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(&path, "{ not json").unwrap();
        let manager = PersistenceManager::new(&path);

        assert!(matches!(
            manager.load().await,
            Err(StorageError::Serialization(_))
        ));
        assert_eq!(manager.load_or_default().await, PersistedState::default());
    }

    #[tokio::test]
    async fn creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/state/data.json");
        let manager = PersistenceManager::new(&path);

        manager.save(&PersistedState::default()).await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn flush_without_saver_reports_stopped() {
        let handle = SaveHandle::detached();
        handle.request_save();
        assert!(matches!(
            handle.flush().await,
            Err(StorageError::SaverStopped)
        ));
    }
}
