//! Error types for playback management

use jukebox_core::{ChannelId, JukeboxError, TransportError};
use thiserror::Error;

/// Playback errors
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// Queue is empty
    #[error("Queue is empty")]
    QueueEmpty,

    /// Nothing is playing or paused
    #[error("Nothing is playing")]
    NothingPlaying,

    /// Index out of bounds
    #[error("Index {index} out of range for queue of {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    /// Volume outside 0.0-1.0 or not a number
    #[error("Invalid volume: {0}")]
    InvalidVolume(f32),

    /// Snapshot failed validation on restore
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// Transport refused a request
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The session shut down before the command ran
    #[error("Session closed for channel {0}")]
    SessionClosed(ChannelId),
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;

impl From<PlaybackError> for JukeboxError {
    fn from(err: PlaybackError) -> Self {
        match err {
            PlaybackError::Transport(e) => Self::Transport(e),
            PlaybackError::SessionClosed(channel) => Self::SessionClosed(channel),
            other => Self::invalid_argument(other.to_string()),
        }
    }
}
