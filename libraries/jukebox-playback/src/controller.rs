//! Session controller
//!
//! Each channel's queue is owned by one actor task. Input surfaces never touch
//! the queue directly: they submit a [`Command`] through a cloneable
//! [`SessionHandle`] and the actor runs commands one at a time, in arrival
//! order. Submitting is a plain (non-async) channel send, so hotkey threads and
//! async chat handlers use the same handle.
//!
//! Transport notifications re-enter the actor as `TrackEnded`/`TrackFailed`
//! commands tagged with the generation of the `start_playback` call they refer
//! to. Anything tagged with an older generation is dropped.

use crate::error::{PlaybackError, Result};
use crate::events::{CloseReason, SessionEvent};
use crate::queue::SessionQueue;
use crate::registry::RegistryShared;
use crate::types::{EnqueuePosition, EnqueueReport, PlaybackState, SessionStatus};
use jukebox_core::{
    AudioTransport, ChannelId, Generation, Mode, SessionSnapshot, TrackDescriptor, TransportError,
};
use jukebox_storage::SaveHandle;
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, trace, warn};

/// Operations a session executes
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Resume if paused, otherwise start from the cursor
    Play,
    Pause,
    TogglePause,
    /// Move past the current track
    Skip,
    /// Absolute volume, 0.0-1.0
    SetVolume(f32),
    /// Relative volume step
    AdjustVolume(f32),
    CycleMode,
    Enqueue {
        tracks: Vec<TrackDescriptor>,
        position: EnqueuePosition,
    },
    /// Remove the entry at an insertion-order index
    Remove(usize),
    /// Play the entry at an insertion-order index
    JumpTo(usize),
    /// Drop the queue and leave the channel
    ClearAndStop,
    /// Leave the channel, keeping the queue for the state file
    Shutdown,
    TrackEnded {
        generation: Generation,
    },
    TrackFailed {
        generation: Generation,
        reason: String,
    },
    Status,
    Snapshot,
}

impl Command {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Play => "play",
            Self::Pause => "pause",
            Self::TogglePause => "toggle_pause",
            Self::Skip => "skip",
            Self::SetVolume(_) => "set_volume",
            Self::AdjustVolume(_) => "adjust_volume",
            Self::CycleMode => "cycle_mode",
            Self::Enqueue { .. } => "enqueue",
            Self::Remove(_) => "remove",
            Self::JumpTo(_) => "jump_to",
            Self::ClearAndStop => "clear_and_stop",
            Self::Shutdown => "shutdown",
            Self::TrackEnded { .. } => "track_ended",
            Self::TrackFailed { .. } => "track_failed",
            Self::Status => "status",
            Self::Snapshot => "snapshot",
        }
    }

    /// Whether running this command makes its channel the most recently active
    fn marks_active(&self) -> bool {
        !matches!(
            self,
            Self::Status | Self::Snapshot | Self::TrackEnded { .. } | Self::TrackFailed { .. }
        )
    }
}

/// Result of a successfully executed command
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutput {
    /// This track is now playing
    Playing(TrackDescriptor),
    Paused,
    Volume(f32),
    Mode(Mode),
    Enqueued {
        report: EnqueueReport,
        /// Set when the enqueue started an idle session
        started: Option<TrackDescriptor>,
    },
    Removed(TrackDescriptor),
    Status(Box<SessionStatus>),
    Snapshot(SessionSnapshot),
    /// The session tore down (exhausted, cleared, or shut down)
    Finished,
    /// A track notification for an old generation was ignored
    Stale,
}

struct Envelope {
    command: Command,
    reply: Option<oneshot::Sender<Result<CommandOutput>>>,
}

/// Cloneable submission handle for one session
#[derive(Clone)]
pub struct SessionHandle {
    channel: ChannelId,
    id: u64,
    tx: mpsc::UnboundedSender<Envelope>,
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("channel", &self.channel)
            .field("id", &self.id)
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl SessionHandle {
    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// Whether the session has stopped accepting commands
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Queue a command and get a reply to await later
    ///
    /// # Errors
    /// `SessionClosed` if the session already tore down
    pub fn submit(&self, command: Command) -> Result<PendingReply> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Envelope {
                command,
                reply: Some(reply),
            })
            .map_err(|_| PlaybackError::SessionClosed(self.channel))?;
        Ok(PendingReply {
            channel: self.channel,
            rx,
        })
    }

    /// Queue a command without waiting for its outcome
    ///
    /// # Errors
    /// `SessionClosed` if the session already tore down
    pub fn send(&self, command: Command) -> Result<()> {
        self.tx
            .send(Envelope {
                command,
                reply: None,
            })
            .map_err(|_| PlaybackError::SessionClosed(self.channel))
    }

    /// Submit and wait for the outcome
    pub async fn execute(&self, command: Command) -> Result<CommandOutput> {
        self.submit(command)?.wait().await
    }
}

/// Reply to a submitted command
pub struct PendingReply {
    channel: ChannelId,
    rx: oneshot::Receiver<Result<CommandOutput>>,
}

impl PendingReply {
    /// Wait for the session to run the command
    ///
    /// # Errors
    /// The command's own error, or `SessionClosed` if the session tore down
    /// before reaching it
    pub async fn wait(self) -> Result<CommandOutput> {
        self.rx
            .await
            .map_err(|_| PlaybackError::SessionClosed(self.channel))?
    }
}

/// Start the actor for `channel` and return its handle
pub(crate) fn spawn_session(
    channel: ChannelId,
    id: u64,
    queue: SessionQueue,
    shared: &Arc<RegistryShared>,
) -> SessionHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let actor = SessionActor {
        channel,
        id,
        queue,
        state: PlaybackState::Stopped,
        generation: Generation::default(),
        closing: None,
        transport: Arc::clone(&shared.transport),
        events: shared.events.clone(),
        saver: shared.saver.clone(),
        registry: Arc::downgrade(shared),
        rx,
    };
    tokio::spawn(actor.run());
    SessionHandle { channel, id, tx }
}

struct SessionActor {
    channel: ChannelId,
    id: u64,
    queue: SessionQueue,
    state: PlaybackState,
    generation: Generation,
    closing: Option<CloseReason>,
    transport: Arc<dyn AudioTransport>,
    events: broadcast::Sender<SessionEvent>,
    saver: SaveHandle,
    registry: Weak<RegistryShared>,
    rx: mpsc::UnboundedReceiver<Envelope>,
}

impl SessionActor {
    async fn run(mut self) {
        debug!(channel = %self.channel, session = self.id, "Session started");

        while let Some(Envelope { command, reply }) = self.rx.recv().await {
            if command.marks_active() {
                if let Some(registry) = self.registry.upgrade() {
                    registry.touch(self.channel);
                }
            }

            let name = command.name();
            let result = self.handle(command).await;
            if let Err(e) = &result {
                debug!(channel = %self.channel, command = name, error = %e, "Command rejected");
            }

            let closing = self.closing;
            if let Some(reason) = closing {
                // Refuse new submissions before deregistering
                self.rx.close();
                self.teardown(reason).await;
            }

            if let Some(reply) = reply {
                if reply.send(result).is_err() {
                    trace!(channel = %self.channel, command = name, "Reply dropped");
                }
            }

            if closing.is_some() {
                return;
            }
        }

        // Every handle is gone; nobody can reach this session anymore
        self.release_transport().await;
        debug!(channel = %self.channel, "Session mailbox closed");
    }

    async fn handle(&mut self, command: Command) -> Result<CommandOutput> {
        match command {
            Command::Play => self.play().await,
            Command::Pause => self.pause().await,
            Command::TogglePause => {
                if self.state == PlaybackState::Playing {
                    self.pause().await
                } else {
                    self.play().await
                }
            }
            Command::Skip => self.skip().await,
            Command::SetVolume(level) => {
                let volume = self.queue.volume_mut().set(level)?;
                self.apply_volume(volume).await;
                Ok(CommandOutput::Volume(volume))
            }
            Command::AdjustVolume(delta) => {
                let volume = self.queue.volume_mut().adjust(delta);
                self.apply_volume(volume).await;
                Ok(CommandOutput::Volume(volume))
            }
            Command::CycleMode => {
                let mode = self.queue.cycle_mode();
                info!(channel = %self.channel, mode = %mode, "Mode changed");
                self.publish(SessionEvent::ModeChanged {
                    channel: self.channel,
                    mode,
                });
                self.saver.request_save();
                Ok(CommandOutput::Mode(mode))
            }
            Command::Enqueue { tracks, position } => self.enqueue(tracks, position).await,
            Command::Remove(index) => self.remove(index).await,
            Command::JumpTo(index) => {
                self.queue.jump_to(index)?;
                self.start_or_finish().await
            }
            Command::ClearAndStop => {
                self.queue.clear();
                self.closing = Some(CloseReason::Cleared);
                Ok(CommandOutput::Finished)
            }
            Command::Shutdown => {
                self.closing = Some(CloseReason::Shutdown);
                Ok(CommandOutput::Finished)
            }
            Command::TrackEnded { generation } => {
                if self.is_stale(generation) {
                    return Ok(CommandOutput::Stale);
                }
                self.queue.advance();
                self.start_or_finish().await
            }
            Command::TrackFailed { generation, reason } => {
                if self.is_stale(generation) {
                    return Ok(CommandOutput::Stale);
                }
                if let Some(track) = self.queue.current().cloned() {
                    warn!(
                        channel = %self.channel,
                        title = track.title(),
                        reason = %reason,
                        "Track failed during playback, skipping"
                    );
                    self.publish(SessionEvent::TrackFailed {
                        channel: self.channel,
                        track,
                        reason,
                    });
                }
                self.queue.advance_past();
                self.start_or_finish().await
            }
            Command::Status => Ok(CommandOutput::Status(Box::new(self.status()))),
            Command::Snapshot => Ok(CommandOutput::Snapshot(self.queue.snapshot(self.channel))),
        }
    }

    fn is_stale(&self, generation: Generation) -> bool {
        let stale = generation != self.generation || self.state == PlaybackState::Stopped;
        if stale {
            debug!(
                channel = %self.channel,
                got = %generation,
                current = %self.generation,
                "Ignoring stale track notification"
            );
        }
        stale
    }

    async fn play(&mut self) -> Result<CommandOutput> {
        match self.state {
            PlaybackState::Playing => self
                .queue
                .current()
                .cloned()
                .map(CommandOutput::Playing)
                .ok_or(PlaybackError::NothingPlaying),
            PlaybackState::Paused => {
                self.transport.resume_playback(self.channel).await?;
                self.state = PlaybackState::Playing;
                self.publish(SessionEvent::Resumed {
                    channel: self.channel,
                });
                self.queue
                    .current()
                    .cloned()
                    .map(CommandOutput::Playing)
                    .ok_or(PlaybackError::NothingPlaying)
            }
            PlaybackState::Stopped => {
                if self.queue.current().is_none() && self.queue.advance().is_none() {
                    return Err(PlaybackError::QueueEmpty);
                }
                self.start_or_finish().await
            }
        }
    }

    async fn pause(&mut self) -> Result<CommandOutput> {
        match self.state {
            PlaybackState::Stopped => Err(PlaybackError::NothingPlaying),
            PlaybackState::Paused => Ok(CommandOutput::Paused),
            PlaybackState::Playing => {
                self.transport.pause_playback(self.channel).await?;
                self.state = PlaybackState::Paused;
                self.publish(SessionEvent::Paused {
                    channel: self.channel,
                });
                Ok(CommandOutput::Paused)
            }
        }
    }

    async fn skip(&mut self) -> Result<CommandOutput> {
        if self.queue.is_empty() {
            return Err(PlaybackError::QueueEmpty);
        }
        self.queue.advance_past();
        self.start_or_finish().await
    }

    async fn enqueue(
        &mut self,
        tracks: Vec<TrackDescriptor>,
        position: EnqueuePosition,
    ) -> Result<CommandOutput> {
        let report = self.queue.enqueue(tracks, position);
        if report.added > 0 {
            info!(
                channel = %self.channel,
                added = report.added,
                skipped = report.skipped,
                len = self.queue.len(),
                "Tracks enqueued"
            );
            self.publish(SessionEvent::QueueChanged {
                channel: self.channel,
                len: self.queue.len(),
            });
            self.saver.request_save();
        }

        let mut started = None;
        if self.state == PlaybackState::Stopped {
            if self.queue.current().is_none() {
                self.queue.advance();
            }
            started = self.start_from_cursor().await?;
            if started.is_none() {
                self.closing = Some(CloseReason::Exhausted);
            }
        }

        Ok(CommandOutput::Enqueued { report, started })
    }

    async fn remove(&mut self, index: usize) -> Result<CommandOutput> {
        let was_current = self.queue.cursor() == Some(index);
        let removed = self.queue.remove(index)?;

        info!(channel = %self.channel, index, title = removed.title(), "Track removed");
        self.publish(SessionEvent::QueueChanged {
            channel: self.channel,
            len: self.queue.len(),
        });
        self.saver.request_save();

        if was_current && self.state != PlaybackState::Stopped {
            match self.start_from_cursor().await {
                Ok(Some(_)) => {}
                Ok(None) => self.closing = Some(CloseReason::Exhausted),
                Err(e) => {
                    warn!(channel = %self.channel, error = %e, "Could not start next track after removal");
                }
            }
        }

        Ok(CommandOutput::Removed(removed))
    }

    async fn start_or_finish(&mut self) -> Result<CommandOutput> {
        match self.start_from_cursor().await? {
            Some(track) => Ok(CommandOutput::Playing(track)),
            None => {
                self.closing = Some(CloseReason::Exhausted);
                Ok(CommandOutput::Finished)
            }
        }
    }

    /// Hand the cursor's track to the transport
    ///
    /// Tracks the transport rejects are skipped, at most once per queued
    /// track. Returns `None` when nothing could be started.
    async fn start_from_cursor(&mut self) -> Result<Option<TrackDescriptor>> {
        let mut attempts = self.queue.len();

        while let Some(track) = self.queue.current().cloned() {
            self.generation = self.generation.next();
            let volume = self.queue.volume().effective(track.normalization_gain());

            match self
                .transport
                .start_playback(self.channel, &track, volume, self.generation)
                .await
            {
                Ok(()) => {
                    self.state = PlaybackState::Playing;
                    info!(
                        channel = %self.channel,
                        title = track.title(),
                        generation = %self.generation,
                        "Track started"
                    );
                    self.publish(SessionEvent::TrackStarted {
                        channel: self.channel,
                        track: track.clone(),
                        generation: self.generation,
                    });
                    return Ok(Some(track));
                }
                Err(TransportError::Source(reason)) => {
                    warn!(
                        channel = %self.channel,
                        title = track.title(),
                        reason = %reason,
                        "Track failed to start, skipping"
                    );
                    self.publish(SessionEvent::TrackFailed {
                        channel: self.channel,
                        track,
                        reason,
                    });

                    attempts = attempts.saturating_sub(1);
                    if attempts == 0 {
                        break;
                    }
                    self.queue.advance_past();
                }
                Err(err) => {
                    self.state = PlaybackState::Stopped;
                    warn!(channel = %self.channel, error = %err, "Transport unavailable");
                    return Err(err.into());
                }
            }
        }

        self.state = PlaybackState::Stopped;
        Ok(None)
    }

    async fn apply_volume(&mut self, volume: f32) {
        if self.state != PlaybackState::Stopped {
            let gain = self.queue.current().and_then(TrackDescriptor::normalization_gain);
            let effective = self.queue.volume().effective(gain);
            if let Err(e) = self.transport.set_volume(self.channel, effective).await {
                warn!(channel = %self.channel, error = %e, "Transport rejected volume change");
            }
        }

        debug!(channel = %self.channel, volume, "Volume changed");
        self.publish(SessionEvent::VolumeChanged {
            channel: self.channel,
            volume,
        });
        self.saver.request_save();
    }

    fn status(&self) -> SessionStatus {
        SessionStatus {
            channel: self.channel,
            state: self.state,
            current: self.queue.current().cloned(),
            cursor: self.queue.cursor(),
            mode: self.queue.mode(),
            volume: self.queue.volume().level(),
            repeat_queue: self.queue.repeat_queue(),
            generation: self.generation,
            tracks: self.queue.tracks().to_vec(),
            view: self
                .queue
                .view(self.queue.mode())
                .into_iter()
                .cloned()
                .collect(),
        }
    }

    async fn release_transport(&mut self) {
        if let Err(e) = self.transport.stop_playback(self.channel).await {
            debug!(channel = %self.channel, error = %e, "Stop failed");
        }
        if let Err(e) = self.transport.leave(self.channel).await {
            debug!(channel = %self.channel, error = %e, "Leave failed");
        }
        self.state = PlaybackState::Stopped;
    }

    async fn teardown(&mut self, reason: CloseReason) {
        self.release_transport().await;

        let parked = (reason == CloseReason::Shutdown && !self.queue.is_empty())
            .then(|| self.queue.snapshot(self.channel));
        if let Some(registry) = self.registry.upgrade() {
            registry.deregister(self.channel, self.id, parked);
        }
        self.saver.request_save();

        info!(channel = %self.channel, reason = ?reason, "Session closed");
        self.publish(SessionEvent::Closed {
            channel: self.channel,
            reason,
        });
    }

    fn publish(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            trace!(channel = %self.channel, "No event subscribers");
        }
    }
}
