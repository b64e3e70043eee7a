/// Named, durable track collections
use super::{TrackDescriptor, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A saved playlist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    /// Case-sensitive key
    pub name: String,
    pub tracks: Vec<TrackDescriptor>,
    /// User who last saved it (informational)
    #[serde(default)]
    pub owner: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Playlist {
    /// Create a new playlist stamped with the current time
    pub fn new(name: impl Into<String>, tracks: Vec<TrackDescriptor>, owner: Option<UserId>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            tracks,
            owner,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace contents, keeping the creation time
    pub fn replace_tracks(&mut self, tracks: Vec<TrackDescriptor>, owner: Option<UserId>) {
        self.tracks = tracks;
        self.owner = owner;
        self.updated_at = Utc::now();
    }

    pub fn summary(&self) -> PlaylistSummary {
        PlaylistSummary {
            name: self.name.clone(),
            track_count: self.tracks.len(),
            updated_at: self.updated_at,
        }
    }
}

/// Listing entry for a playlist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistSummary {
    pub name: String,
    pub track_count: usize,
    pub updated_at: DateTime<Utc>,
}
