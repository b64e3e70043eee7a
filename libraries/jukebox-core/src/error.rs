/// Core error types for Jukebox
use crate::types::ChannelId;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Result type alias using `JukeboxError`
pub type Result<T> = std::result::Result<T, JukeboxError>;

/// Core error type for Jukebox
#[derive(Error, Debug)]
pub enum JukeboxError {
    /// Entity not found (playlist, queue entry, session)
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Invalid argument (bad volume, empty queue operation, bad index)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Command rejected by an authorization check
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Voice/audio transport failure
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Command raced a session teardown
    #[error("Session closed for channel {0}")]
    SessionClosed(ChannelId),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Persisted state could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),
}

impl JukeboxError {
    /// Create a not found error
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a permission denied error
    pub fn permission_denied(msg: impl Into<String>) -> Self {
        Self::PermissionDenied(msg.into())
    }

    /// Result code reported to the invoking surface
    pub fn code(&self) -> ResultCode {
        match self {
            Self::NotFound { .. } => ResultCode::NotFound,
            Self::InvalidArgument(_) => ResultCode::InvalidArgument,
            Self::PermissionDenied(_) => ResultCode::PermissionDenied,
            Self::Transport(_) | Self::SessionClosed(_) | Self::Io(_) | Self::Parse(_) => {
                ResultCode::TransportUnavailable
            }
        }
    }
}

impl From<serde_json::Error> for JukeboxError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

/// Failures reported by the audio transport
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The transport itself is down (not connected to voice, shut down)
    #[error("Transport unavailable: {0}")]
    Unavailable(String),

    /// This particular source could not be played
    #[error("Source unavailable: {0}")]
    Source(String),
}

/// Failures reported by a resolver
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// Nothing matched the query
    #[error("No results for '{0}'")]
    NotFound(String),

    /// The upstream catalog throttled us
    #[error("Rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },
}

impl From<ResolveError> for JukeboxError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::NotFound(query) => Self::not_found("Track", query),
            ResolveError::RateLimited { .. } => {
                Self::Transport(TransportError::Unavailable(err.to_string()))
            }
        }
    }
}

/// Outcome code returned to the chat layer for every command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultCode {
    /// Command applied
    Success,
    /// Referenced playlist or track is missing
    NotFound,
    /// Caller may not run this command
    PermissionDenied,
    /// Bad argument (volume range, index, empty queue)
    InvalidArgument,
    /// Voice transport or music feature unavailable
    TransportUnavailable,
}

impl ResultCode {
    /// Whether the command succeeded
    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}
