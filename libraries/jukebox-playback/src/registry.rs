//! Session registry
//!
//! Maps channels to their session handles and keeps the order in which
//! channels were last acted on, for inputs (hotkeys) that carry no channel of
//! their own. A channel moves to the front when its session is created or runs
//! a user command, and drops out when the session closes, so the previous
//! channel takes over.

use crate::controller::{spawn_session, Command, CommandOutput, SessionHandle};
use crate::error::{PlaybackError, Result};
use crate::events::SessionEvent;
use crate::queue::SessionQueue;
use crate::types::{EnqueuePosition, PlaybackConfig};
use jukebox_core::{AudioTransport, ChannelId, SessionSnapshot, TrackDescriptor};
use jukebox_storage::SaveHandle;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

const EVENT_CAPACITY: usize = 256;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared between the registry and its session actors
pub(crate) struct RegistryShared {
    sessions: Mutex<HashMap<ChannelId, SessionHandle>>,
    /// Channels by last activity, most recent last
    activity: Mutex<Vec<ChannelId>>,
    /// Queues of sessions closed by shutdown, kept for the state file
    parked: Mutex<HashMap<ChannelId, SessionSnapshot>>,
    next_id: AtomicU64,
    pub(crate) transport: Arc<dyn AudioTransport>,
    pub(crate) events: broadcast::Sender<SessionEvent>,
    pub(crate) saver: SaveHandle,
    config: PlaybackConfig,
}

impl RegistryShared {
    pub(crate) fn touch(&self, channel: ChannelId) {
        let mut activity = lock(&self.activity);
        activity.retain(|c| *c != channel);
        activity.push(channel);
    }

    /// Remove a closing session, unless a newer one already took its channel
    pub(crate) fn deregister(&self, channel: ChannelId, id: u64, parked: Option<SessionSnapshot>) {
        let removed = {
            let mut sessions = lock(&self.sessions);
            if sessions.get(&channel).is_some_and(|h| h.id() == id) {
                sessions.remove(&channel);
                true
            } else {
                false
            }
        };

        if !removed {
            return;
        }

        lock(&self.activity).retain(|c| *c != channel);

        let mut parked_sessions = lock(&self.parked);
        match parked {
            Some(snapshot) => {
                parked_sessions.insert(channel, snapshot);
            }
            None => {
                parked_sessions.remove(&channel);
            }
        }
    }
}

/// Channel → session map
#[derive(Clone)]
pub struct SessionRegistry {
    shared: Arc<RegistryShared>,
}

impl SessionRegistry {
    pub fn new(
        transport: Arc<dyn AudioTransport>,
        saver: SaveHandle,
        config: PlaybackConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            shared: Arc::new(RegistryShared {
                sessions: Mutex::new(HashMap::new()),
                activity: Mutex::new(Vec::new()),
                parked: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                transport,
                events,
                saver,
                config,
            }),
        }
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.shared.config
    }

    /// Receive every session's events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    fn spawn(&self, channel: ChannelId, queue: SessionQueue) -> SessionHandle {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        spawn_session(channel, id, queue, &self.shared)
    }

    /// Live session for `channel`, creating an empty one if needed
    ///
    /// Must be called from within a tokio runtime.
    pub fn get_or_create(&self, channel: ChannelId) -> SessionHandle {
        let mut sessions = lock(&self.shared.sessions);
        if let Some(handle) = sessions.get(&channel) {
            if !handle.is_closed() {
                return handle.clone();
            }
        }

        let handle = self.spawn(channel, SessionQueue::new(&self.shared.config));
        sessions.insert(channel, handle.clone());
        drop(sessions);

        self.shared.touch(channel);
        lock(&self.shared.parked).remove(&channel);
        info!(channel = %channel, "Session created");
        handle
    }

    /// Live session for `channel`
    pub fn get(&self, channel: ChannelId) -> Option<SessionHandle> {
        lock(&self.shared.sessions)
            .get(&channel)
            .filter(|handle| !handle.is_closed())
            .cloned()
    }

    /// Live session that was most recently created or ran a user command
    pub fn most_recent(&self) -> Option<SessionHandle> {
        let activity = lock(&self.shared.activity).clone();
        activity
            .into_iter()
            .rev()
            .find_map(|channel| self.get(channel))
    }

    /// Channels with a live session, sorted
    pub fn channels(&self) -> Vec<ChannelId> {
        let mut channels: Vec<_> = lock(&self.shared.sessions).keys().copied().collect();
        channels.sort_unstable();
        channels
    }

    pub fn len(&self) -> usize {
        lock(&self.shared.sessions).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Enqueue into `channel`, creating the session on first use
    ///
    /// If the session tears down between lookup and execution, a fresh
    /// session is created and the enqueue retried once.
    pub async fn enqueue(
        &self,
        channel: ChannelId,
        tracks: Vec<TrackDescriptor>,
        position: EnqueuePosition,
    ) -> Result<CommandOutput> {
        let first = self
            .get_or_create(channel)
            .execute(Command::Enqueue {
                tracks: tracks.clone(),
                position,
            })
            .await;

        match first {
            Err(PlaybackError::SessionClosed(_)) => {
                debug!(channel = %channel, "Enqueue raced a teardown, retrying");
                self.get_or_create(channel)
                    .execute(Command::Enqueue { tracks, position })
                    .await
            }
            other => other,
        }
    }

    /// Snapshot every non-empty session, live or parked by shutdown
    pub async fn snapshot_all(&self) -> Vec<SessionSnapshot> {
        let handles: Vec<SessionHandle> = lock(&self.shared.sessions).values().cloned().collect();
        let mut snapshots: BTreeMap<ChannelId, SessionSnapshot> = lock(&self.shared.parked)
            .iter()
            .map(|(channel, snapshot)| (*channel, snapshot.clone()))
            .collect();

        for handle in handles {
            match handle.execute(Command::Snapshot).await {
                Ok(CommandOutput::Snapshot(snapshot)) => {
                    snapshots.insert(snapshot.channel, snapshot);
                }
                Ok(_) => {}
                Err(e) => debug!(channel = %handle.channel(), error = %e, "Snapshot skipped"),
            }
        }

        snapshots
            .into_values()
            .filter(|snapshot| !snapshot.tracks.is_empty())
            .collect()
    }

    /// Recreate idle sessions from persisted snapshots
    ///
    /// Invalid snapshots and channels that already have a session are
    /// skipped. Returns the number restored.
    pub fn restore(&self, snapshots: Vec<SessionSnapshot>) -> usize {
        let mut restored = 0;

        for snapshot in snapshots {
            if snapshot.tracks.is_empty() {
                continue;
            }

            let queue = match SessionQueue::from_snapshot(&snapshot, &self.shared.config) {
                Ok(queue) => queue,
                Err(e) => {
                    warn!(channel = %snapshot.channel, error = %e, "Skipping session snapshot");
                    continue;
                }
            };

            let mut sessions = lock(&self.shared.sessions);
            if sessions.contains_key(&snapshot.channel) {
                warn!(channel = %snapshot.channel, "Session already live, snapshot ignored");
                continue;
            }
            let handle = self.spawn(snapshot.channel, queue);
            sessions.insert(snapshot.channel, handle);
            drop(sessions);
            self.shared.touch(snapshot.channel);
            restored += 1;
        }

        info!(restored, "Sessions restored");
        restored
    }

    /// Start playback in every live session; returns how many started
    pub async fn resume_all(&self) -> usize {
        let mut resumed = 0;
        for channel in self.channels() {
            let Some(handle) = self.get(channel) else {
                continue;
            };
            match handle.execute(Command::Play).await {
                Ok(CommandOutput::Playing(_)) => resumed += 1,
                Ok(_) => {}
                Err(e) => warn!(channel = %channel, error = %e, "Could not resume session"),
            }
        }
        resumed
    }

    /// Close every session, keeping their queues for the state file
    pub async fn shutdown_all(&self) {
        let handles: Vec<SessionHandle> = lock(&self.shared.sessions).values().cloned().collect();
        info!(sessions = handles.len(), "Shutting down sessions");

        for handle in handles {
            if let Err(e) = handle.execute(Command::Shutdown).await {
                debug!(channel = %handle.channel(), error = %e, "Session already closed");
            }
        }
    }
}
