/// On-disk process state
use crate::error::{Result, StorageError};
use crate::stats::CommandStats;
use jukebox_core::{Playlist, SessionSnapshot, UserId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Current state file format version
pub const STATE_VERSION: u32 = 1;

/// Everything the bot persists between runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default = "default_version")]
    pub version: u32,
    /// Playlists keyed by exact name
    #[serde(default)]
    pub playlists: BTreeMap<String, Playlist>,
    #[serde(default)]
    pub sessions: Vec<SessionSnapshot>,
    #[serde(default)]
    pub disabled_users: BTreeSet<UserId>,
    #[serde(default = "default_music_enabled")]
    pub music_enabled: bool,
    #[serde(default)]
    pub stats: CommandStats,
}

fn default_version() -> u32 {
    STATE_VERSION
}

fn default_music_enabled() -> bool {
    true
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            playlists: BTreeMap::new(),
            sessions: Vec::new(),
            disabled_users: BTreeSet::new(),
            music_enabled: true,
            stats: CommandStats::default(),
        }
    }
}

impl PersistedState {
    /// Reject states that cannot be restored as-is
    pub fn validate(&self) -> Result<()> {
        if self.version > STATE_VERSION {
            return Err(StorageError::Validation(format!(
                "state version {} is newer than supported version {}",
                self.version, STATE_VERSION
            )));
        }

        for (key, playlist) in &self.playlists {
            if key != &playlist.name {
                return Err(StorageError::Validation(format!(
                    "playlist stored under '{}' is named '{}'",
                    key, playlist.name
                )));
            }
        }

        for session in &self.sessions {
            session.validate().map_err(|msg| {
                StorageError::Validation(format!("session {}: {}", session.channel, msg))
            })?;
        }

        Ok(())
    }
}
