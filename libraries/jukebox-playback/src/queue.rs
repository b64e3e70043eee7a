//! Session queue and playback mode state machine
//!
//! The queue stores tracks in insertion order and never reorders them. The
//! active [`Mode`] only decides where the cursor goes next:
//!
//! - Sequential: the following entry, wrapping only with `repeat_queue`
//! - Shuffle: the next pick of the current [`ShuffleCycle`]
//! - Alphabetical: the entry with the next (lowercase title, index) key,
//!   wrapping only with `repeat_queue`
//! - Loop: the current entry again
//!
//! Because storage order is untouched, switching modes back and forth never
//! loses the original order.

use crate::error::{PlaybackError, Result};
use crate::shuffle::ShuffleCycle;
use crate::types::{EnqueuePosition, EnqueueReport, PlaybackConfig};
use crate::volume::Volume;
use jukebox_core::{ChannelId, Mode, SessionSnapshot, TrackDescriptor};
use std::collections::HashSet;

/// Ordered tracks and cursor for one channel
#[derive(Debug, Clone)]
pub struct SessionQueue {
    tracks: Vec<TrackDescriptor>,
    cursor: Option<usize>,
    mode: Mode,
    repeat_queue: bool,
    volume: Volume,
    /// Present only while in Shuffle mode
    shuffle: Option<ShuffleCycle>,
}

impl SessionQueue {
    /// Empty queue in Sequential mode
    pub fn new(config: &PlaybackConfig) -> Self {
        Self {
            tracks: Vec::new(),
            cursor: None,
            mode: Mode::Sequential,
            repeat_queue: config.repeat_queue,
            volume: Volume::new(config.default_volume, config.max_volume),
            shuffle: None,
        }
    }

    /// Rebuild a queue from a persisted snapshot
    ///
    /// # Errors
    /// `InvalidSnapshot` if the cursor or volume is out of range
    pub fn from_snapshot(snapshot: &SessionSnapshot, config: &PlaybackConfig) -> Result<Self> {
        snapshot.validate().map_err(PlaybackError::InvalidSnapshot)?;

        let mut queue = Self {
            tracks: snapshot.tracks.clone(),
            cursor: snapshot.cursor,
            mode: Mode::Sequential,
            repeat_queue: snapshot.repeat_queue,
            volume: Volume::new(snapshot.volume, config.max_volume),
            shuffle: None,
        };
        queue.set_mode(snapshot.mode);
        Ok(queue)
    }

    /// Persistable copy of this queue
    pub fn snapshot(&self, channel: ChannelId) -> SessionSnapshot {
        SessionSnapshot {
            channel,
            tracks: self.tracks.clone(),
            cursor: self.cursor,
            mode: self.mode,
            volume: self.volume.level(),
            repeat_queue: self.repeat_queue,
        }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Tracks in insertion order
    pub fn tracks(&self) -> &[TrackDescriptor] {
        &self.tracks
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn repeat_queue(&self) -> bool {
        self.repeat_queue
    }

    pub fn set_repeat_queue(&mut self, repeat: bool) {
        self.repeat_queue = repeat;
    }

    pub fn volume(&self) -> &Volume {
        &self.volume
    }

    pub fn volume_mut(&mut self) -> &mut Volume {
        &mut self.volume
    }

    /// Track under the cursor
    pub fn current(&self) -> Option<&TrackDescriptor> {
        self.cursor.and_then(|index| self.tracks.get(index))
    }

    /// Insert tracks, skipping any whose source is already queued
    ///
    /// `Next` inserts right after the cursor (at the front when there is no
    /// cursor); in Shuffle mode those tracks also become the next picks.
    pub fn enqueue(
        &mut self,
        tracks: Vec<TrackDescriptor>,
        position: EnqueuePosition,
    ) -> EnqueueReport {
        let mut seen: HashSet<String> = self
            .tracks
            .iter()
            .map(|t| t.source().to_string())
            .collect();

        let mut report = EnqueueReport::default();
        let mut fresh = Vec::with_capacity(tracks.len());
        for track in tracks {
            if seen.insert(track.source().to_string()) {
                fresh.push(track);
            } else {
                report.skipped += 1;
            }
        }
        report.added = fresh.len();

        if fresh.is_empty() {
            return report;
        }

        let inserted: Vec<String> = fresh.iter().map(|t| t.source().to_string()).collect();
        match position {
            EnqueuePosition::End => self.tracks.extend(fresh),
            EnqueuePosition::Next => {
                let at = self.cursor.map_or(0, |c| c + 1);
                self.tracks.splice(at..at, fresh);
            }
        }

        if let Some(cycle) = &mut self.shuffle {
            cycle.redraw(&self.tracks);
            if position == EnqueuePosition::Next {
                cycle.prioritize(&inserted);
            }
        }

        report
    }

    /// Remove the entry at `index`
    ///
    /// Removing the current entry leaves the cursor on the track that
    /// shifted into its place. When the current entry was the last one, the
    /// cursor moves to the mode's successor instead, and is cleared only if
    /// the mode has nothing left to play.
    ///
    /// # Errors
    /// `IndexOutOfBounds` if `index` is past the end
    pub fn remove(&mut self, index: usize) -> Result<TrackDescriptor> {
        let len = self.tracks.len();
        if index >= len {
            return Err(PlaybackError::IndexOutOfBounds { index, len });
        }

        let removed = self.tracks.remove(index);
        if let Some(cycle) = &mut self.shuffle {
            cycle.redraw(&self.tracks);
        }

        let cursor = self.cursor;
        self.cursor = match cursor {
            Some(c) if index < c => Some(c - 1),
            Some(c) if index == c && c < self.tracks.len() => {
                if let Some(cycle) = &mut self.shuffle {
                    cycle.mark_played(&self.tracks[c]);
                }
                Some(c)
            }
            Some(c) if index == c => self.successor_of_removed(&removed, c),
            other => other,
        };

        Ok(removed)
    }

    /// Successor of a removed current entry that sat at the end (`at == len`)
    fn successor_of_removed(&mut self, removed: &TrackDescriptor, at: usize) -> Option<usize> {
        if self.tracks.is_empty() {
            return None;
        }

        match self.mode {
            Mode::Sequential | Mode::Loop => self.repeat_queue.then_some(0),
            Mode::Alphabetical => {
                let gone = (removed.sort_title(), at);
                let keys: Vec<(String, usize)> = self
                    .tracks
                    .iter()
                    .enumerate()
                    .map(|(i, t)| (t.sort_title(), i))
                    .collect();
                keys.iter()
                    .filter(|key| **key > gone)
                    .min()
                    .or(if self.repeat_queue { keys.iter().min() } else { None })
                    .map(|(_, i)| *i)
            }
            Mode::Shuffle => self
                .shuffle
                .get_or_insert_with(ShuffleCycle::default)
                .next_index(&self.tracks, None),
        }
    }

    /// Move the cursor to the next track for a natural track end
    ///
    /// Returns `None` when the queue is exhausted; the cursor is cleared.
    pub fn advance(&mut self) -> Option<TrackDescriptor> {
        let next = match self.mode {
            Mode::Loop => self.cursor.or_else(|| self.sequential_successor()),
            _ => self.successor(),
        };
        self.move_to(next)
    }

    /// Move past the current track (skip, or the current track failed)
    ///
    /// Same as [`advance`](Self::advance) except in Loop mode, where the
    /// sequential successor is chosen and the mode stays Loop.
    pub fn advance_past(&mut self) -> Option<TrackDescriptor> {
        let next = match self.mode {
            Mode::Loop => self.sequential_successor(),
            _ => self.successor(),
        };
        self.move_to(next)
    }

    /// Point the cursor at `index` directly
    ///
    /// # Errors
    /// `IndexOutOfBounds` if `index` is past the end
    pub fn jump_to(&mut self, index: usize) -> Result<TrackDescriptor> {
        let track = self
            .tracks
            .get(index)
            .cloned()
            .ok_or(PlaybackError::IndexOutOfBounds {
                index,
                len: self.tracks.len(),
            })?;

        self.cursor = Some(index);
        if let Some(cycle) = &mut self.shuffle {
            cycle.mark_played(&track);
        }
        Ok(track)
    }

    /// Drop every track and the cursor
    pub fn clear(&mut self) {
        self.tracks.clear();
        self.cursor = None;
        if self.shuffle.is_some() {
            self.shuffle = Some(ShuffleCycle::default());
        }
    }

    /// Switch mode; entering Shuffle draws a new permutation
    pub fn set_mode(&mut self, mode: Mode) {
        if mode == Mode::Shuffle {
            let cycle = ShuffleCycle::begin(&self.tracks, self.current());
            self.shuffle = Some(cycle);
        } else {
            self.shuffle = None;
        }
        self.mode = mode;
    }

    /// Step to the next mode in the cycle
    pub fn cycle_mode(&mut self) -> Mode {
        self.set_mode(self.mode.next());
        self.mode
    }

    /// Presentation order under `mode`, without touching storage
    ///
    /// For Shuffle this is the current track, then the remaining picks of the
    /// active cycle, then everything else in insertion order.
    pub fn view(&self, mode: Mode) -> Vec<&TrackDescriptor> {
        match mode {
            Mode::Sequential | Mode::Loop => self.tracks.iter().collect(),
            Mode::Alphabetical => {
                let mut order: Vec<usize> = (0..self.tracks.len()).collect();
                order.sort_by_cached_key(|&i| (self.tracks[i].sort_title(), i));
                order.into_iter().map(|i| &self.tracks[i]).collect()
            }
            Mode::Shuffle => {
                let mut included = vec![false; self.tracks.len()];
                let mut order = Vec::with_capacity(self.tracks.len());

                if let Some(c) = self.cursor {
                    included[c] = true;
                    order.push(c);
                }
                if let Some(cycle) = &self.shuffle {
                    for source in cycle.upcoming() {
                        if let Some(i) = self.tracks.iter().position(|t| t.source() == source) {
                            if !included[i] {
                                included[i] = true;
                                order.push(i);
                            }
                        }
                    }
                }
                order.extend((0..self.tracks.len()).filter(|&i| !included[i]));
                order.into_iter().map(|i| &self.tracks[i]).collect()
            }
        }
    }

    fn move_to(&mut self, next: Option<usize>) -> Option<TrackDescriptor> {
        self.cursor = next;
        self.current().cloned()
    }

    fn successor(&mut self) -> Option<usize> {
        match self.mode {
            Mode::Sequential | Mode::Loop => self.sequential_successor(),
            Mode::Alphabetical => self.alphabetical_successor(),
            Mode::Shuffle => {
                let current = self.cursor.and_then(|c| self.tracks.get(c));
                self.shuffle
                    .get_or_insert_with(ShuffleCycle::default)
                    .next_index(&self.tracks, current)
            }
        }
    }

    fn sequential_successor(&self) -> Option<usize> {
        let len = self.tracks.len();
        if len == 0 {
            return None;
        }

        match self.cursor {
            None => Some(0),
            Some(c) if c + 1 < len => Some(c + 1),
            Some(_) if self.repeat_queue => Some(0),
            Some(_) => None,
        }
    }

    fn alphabetical_successor(&self) -> Option<usize> {
        let keys: Vec<(String, usize)> = self
            .tracks
            .iter()
            .enumerate()
            .map(|(i, t)| (t.sort_title(), i))
            .collect();
        let smallest = keys.iter().min().map(|(_, i)| *i);

        let Some(cursor) = self.cursor else {
            return smallest;
        };

        let current = &keys[cursor];
        keys.iter()
            .filter(|key| *key > current)
            .min()
            .map(|(_, i)| *i)
            .or(if self.repeat_queue { smallest } else { None })
    }
}
