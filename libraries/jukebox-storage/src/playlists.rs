//! Named playlist library
//!
//! Playlists are keyed by their exact, case-sensitive name. Loading always
//! hands back a copy of the stored tracks, so later changes to a live queue
//! never reach the stored playlist.

use crate::error::{Result, StorageError};
use crate::persistence::SaveHandle;
use jukebox_core::{Playlist, PlaylistSummary, TrackDescriptor, UserId};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::info;

/// In-memory playlist library backed by the state file
pub struct PlaylistStore {
    playlists: RwLock<BTreeMap<String, Playlist>>,
    saver: SaveHandle,
}

impl PlaylistStore {
    pub fn new(playlists: BTreeMap<String, Playlist>, saver: SaveHandle) -> Self {
        Self {
            playlists: RwLock::new(playlists),
            saver,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, Playlist>> {
        self.playlists.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, Playlist>> {
        self.playlists
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Create or overwrite a playlist
    ///
    /// # Errors
    /// `InvalidArgument` for a blank name or an empty track list
    pub fn save(
        &self,
        name: &str,
        tracks: Vec<TrackDescriptor>,
        owner: Option<UserId>,
    ) -> Result<PlaylistSummary> {
        if name.trim().is_empty() {
            return Err(StorageError::invalid_argument("playlist name is blank"));
        }
        if tracks.is_empty() {
            return Err(StorageError::invalid_argument(
                "cannot save an empty playlist",
            ));
        }

        let summary = {
            let mut playlists = self.write();
            let playlist = match playlists.entry(name.to_string()) {
                Entry::Occupied(entry) => {
                    let existing = entry.into_mut();
                    existing.replace_tracks(tracks, owner);
                    existing
                }
                Entry::Vacant(entry) => entry.insert(Playlist::new(name, tracks, owner)),
            };
            playlist.summary()
        };

        info!(
            playlist = %summary.name,
            tracks = summary.track_count,
            "Playlist saved"
        );
        self.saver.request_save();
        Ok(summary)
    }

    /// Copy of a playlist's tracks
    ///
    /// # Errors
    /// `NotFound` if no playlist has this exact name
    pub fn load(&self, name: &str) -> Result<Vec<TrackDescriptor>> {
        self.read()
            .get(name)
            .map(|playlist| playlist.tracks.clone())
            .ok_or_else(|| StorageError::not_found("Playlist", name))
    }

    /// All playlists, sorted by name
    pub fn list(&self) -> Vec<PlaylistSummary> {
        self.read().values().map(Playlist::summary).collect()
    }

    /// Remove a playlist
    ///
    /// # Errors
    /// `NotFound` if no playlist has this exact name
    pub fn delete(&self, name: &str) -> Result<()> {
        if self.write().remove(name).is_none() {
            return Err(StorageError::not_found("Playlist", name));
        }

        info!(playlist = %name, "Playlist deleted");
        self.saver.request_save();
        Ok(())
    }

    /// Copy of the whole library for persistence
    pub fn snapshot(&self) -> BTreeMap<String, Playlist> {
        self.read().clone()
    }
}
