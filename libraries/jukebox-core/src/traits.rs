/// Collaborator traits for Jukebox
///
/// The resolver and the voice transport live outside the playback manager;
/// sessions only ever reach them through these traits.
use crate::error::{ResolveError, TransportError};
use crate::types::{ChannelId, Generation, TrackDescriptor};
use async_trait::async_trait;

/// Turns a user query into playable descriptors
///
/// Resolution always happens before a command reaches a session so that
/// slow lookups never block the session's mailbox.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Resolve a free-form query or URL
    ///
    /// # Errors
    /// `NotFound` when nothing matched, `RateLimited` when the upstream
    /// catalog throttles requests
    async fn resolve(&self, query: &str) -> Result<Vec<TrackDescriptor>, ResolveError>;
}

/// Voice transport used by sessions
///
/// Completion is reported asynchronously as a [`TransportEvent`] over the
/// sender the transport was constructed with, tagged with the generation
/// passed to `start_playback`.
#[async_trait]
pub trait AudioTransport: Send + Sync {
    /// Start playing `track` in `channel`, replacing anything already playing
    ///
    /// # Errors
    /// `Source` when this track cannot be played, `Unavailable` when the
    /// transport itself is down
    async fn start_playback(
        &self,
        channel: ChannelId,
        track: &TrackDescriptor,
        volume: f32,
        generation: Generation,
    ) -> Result<(), TransportError>;

    /// Pause the current track
    async fn pause_playback(&self, channel: ChannelId) -> Result<(), TransportError>;

    /// Resume a paused track
    async fn resume_playback(&self, channel: ChannelId) -> Result<(), TransportError>;

    /// Stop playback without emitting a track-ended notification
    async fn stop_playback(&self, channel: ChannelId) -> Result<(), TransportError>;

    /// Change the volume of the current track
    async fn set_volume(&self, channel: ChannelId, volume: f32) -> Result<(), TransportError>;

    /// Disconnect from the voice channel
    async fn leave(&self, channel: ChannelId) -> Result<(), TransportError>;
}

/// Notification emitted by a transport when a track stops on its own
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportEvent {
    pub channel: ChannelId,
    pub generation: Generation,
    pub kind: TransportEventKind,
}

/// What happened to the track
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEventKind {
    /// Track played to the end
    Ended,
    /// Playback broke mid-track
    Failed(String),
}

impl TransportEvent {
    pub fn ended(channel: ChannelId, generation: Generation) -> Self {
        Self {
            channel,
            generation,
            kind: TransportEventKind::Ended,
        }
    }

    pub fn failed(channel: ChannelId, generation: Generation, reason: impl Into<String>) -> Self {
        Self {
            channel,
            generation,
            kind: TransportEventKind::Failed(reason.into()),
        }
    }
}
