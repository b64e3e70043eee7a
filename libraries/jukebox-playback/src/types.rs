//! Core types for playback management

use jukebox_core::{ChannelId, Generation, Mode, TrackDescriptor};
use serde::{Deserialize, Serialize};

/// Playback state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    /// Nothing handed to the transport
    Stopped,

    /// Currently playing
    Playing,

    /// Paused mid-track
    Paused,
}

/// Where enqueued tracks are inserted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnqueuePosition {
    /// Append to the end of the queue
    #[default]
    End,

    /// Insert right after the current track
    Next,
}

/// Outcome of an enqueue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnqueueReport {
    /// Tracks inserted
    pub added: usize,

    /// Tracks ignored because their source was already queued
    pub skipped: usize,
}

/// Playback configuration
#[derive(Debug, Clone, Copy)]
pub struct PlaybackConfig {
    /// Volume for new sessions (0.0-1.0)
    pub default_volume: f32,

    /// Upper bound applied to every volume change
    pub max_volume: f32,

    /// Wrap Sequential and Alphabetical at the end of the queue
    pub repeat_queue: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            default_volume: 0.2,
            max_volume: 1.0,
            repeat_queue: false,
        }
    }
}

/// Point-in-time view of a session for now-playing and queue displays
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStatus {
    pub channel: ChannelId,
    pub state: PlaybackState,
    pub current: Option<TrackDescriptor>,
    pub cursor: Option<usize>,
    pub mode: Mode,
    pub volume: f32,
    pub repeat_queue: bool,
    pub generation: Generation,
    /// Queue in insertion order; indices match `Remove`/`JumpTo`
    pub tracks: Vec<TrackDescriptor>,
    /// Queue in the order the active mode presents it
    pub view: Vec<TrackDescriptor>,
}
