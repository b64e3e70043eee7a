//! Session events
//!
//! Published on the registry's broadcast channel for announcers and loggers.

use jukebox_core::{ChannelId, Generation, Mode, TrackDescriptor};

/// Why a session closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Queue ran out of tracks
    Exhausted,
    /// Cleared by a user
    Cleared,
    /// Process shutdown
    Shutdown,
}

/// Something observable happened in a session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Transport accepted a new track
    TrackStarted {
        channel: ChannelId,
        track: TrackDescriptor,
        generation: Generation,
    },

    /// A track could not be played and was skipped
    TrackFailed {
        channel: ChannelId,
        track: TrackDescriptor,
        reason: String,
    },

    Paused {
        channel: ChannelId,
    },

    Resumed {
        channel: ChannelId,
    },

    VolumeChanged {
        channel: ChannelId,
        volume: f32,
    },

    ModeChanged {
        channel: ChannelId,
        mode: Mode,
    },

    /// Tracks were added or removed
    QueueChanged {
        channel: ChannelId,
        len: usize,
    },

    /// Session left the channel and deregistered
    Closed {
        channel: ChannelId,
        reason: CloseReason,
    },
}

impl SessionEvent {
    /// Channel the event belongs to
    pub fn channel(&self) -> ChannelId {
        match self {
            Self::TrackStarted { channel, .. }
            | Self::TrackFailed { channel, .. }
            | Self::Paused { channel }
            | Self::Resumed { channel }
            | Self::VolumeChanged { channel, .. }
            | Self::ModeChanged { channel, .. }
            | Self::QueueChanged { channel, .. }
            | Self::Closed { channel, .. } => *channel,
        }
    }
}
