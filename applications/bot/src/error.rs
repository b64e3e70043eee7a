/// Bot error types
use jukebox_core::JukeboxError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BotError>;

#[derive(Debug, Error)]
pub enum BotError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Core(#[from] JukeboxError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<jukebox_storage::StorageError> for BotError {
    fn from(err: jukebox_storage::StorageError) -> Self {
        // StorageError -> JukeboxError -> BotError
        BotError::Core(err.into())
    }
}

impl From<jukebox_playback::PlaybackError> for BotError {
    fn from(err: jukebox_playback::PlaybackError) -> Self {
        BotError::Core(err.into())
    }
}
