//! Shuffle cycle
//!
//! A cycle is a random permutation of the queue's sources. Picks are taken
//! from the permutation until every track has been picked once; the next pick
//! starts a fresh permutation. The permutation is redrawn from the unplayed
//! tracks whenever the queue changes mid-cycle, so a cycle never repeats a
//! track.

use jukebox_core::TrackDescriptor;
use rand::seq::SliceRandom;
use rand::thread_rng;
use std::collections::HashSet;

/// Permutation state for Shuffle mode. Not persisted.
#[derive(Debug, Clone, Default)]
pub struct ShuffleCycle {
    /// Upcoming sources, next pick last
    upcoming: Vec<String>,
    /// Sources already picked in this cycle
    played: HashSet<String>,
}

impl ShuffleCycle {
    /// Start a cycle; `current`, if any, counts as already played
    pub fn begin(tracks: &[TrackDescriptor], current: Option<&TrackDescriptor>) -> Self {
        let mut cycle = Self::default();
        if let Some(track) = current {
            cycle.played.insert(track.source().to_string());
        }
        cycle.redraw(tracks);
        cycle
    }

    /// Redraw the permutation over unplayed tracks after a queue change
    pub fn redraw(&mut self, tracks: &[TrackDescriptor]) {
        let present: HashSet<&str> = tracks.iter().map(TrackDescriptor::source).collect();
        self.played.retain(|source| present.contains(source.as_str()));

        self.upcoming = tracks
            .iter()
            .map(|t| t.source().to_string())
            .filter(|source| !self.played.contains(source))
            .collect();
        self.upcoming.shuffle(&mut thread_rng());
    }

    /// Move `sources` to the front of the upcoming picks, keeping their order
    pub fn prioritize(&mut self, sources: &[String]) {
        self.upcoming.retain(|s| !sources.contains(s));
        self.upcoming
            .extend(sources.iter().rev().filter(|s| !self.played.contains(*s)).cloned());
    }

    /// Record a track chosen outside the cycle (jump)
    pub fn mark_played(&mut self, track: &TrackDescriptor) {
        let source = track.source();
        self.upcoming.retain(|s| s != source);
        self.played.insert(source.to_string());
    }

    /// Pick the next track's index in `tracks`
    ///
    /// Starts a new cycle when the current one is used up. A new cycle's
    /// first pick is never `current` when there is more than one track.
    pub fn next_index(
        &mut self,
        tracks: &[TrackDescriptor],
        current: Option<&TrackDescriptor>,
    ) -> Option<usize> {
        if tracks.is_empty() {
            return None;
        }

        loop {
            if self.upcoming.is_empty() {
                self.start_new_cycle(tracks, current);
            }

            let source = self.upcoming.pop()?;
            if let Some(index) = tracks.iter().position(|t| t.source() == source) {
                self.played.insert(source);
                return Some(index);
            }
        }
    }

    fn start_new_cycle(&mut self, tracks: &[TrackDescriptor], current: Option<&TrackDescriptor>) {
        self.played.clear();
        self.upcoming = tracks.iter().map(|t| t.source().to_string()).collect();
        self.upcoming.shuffle(&mut thread_rng());

        let len = self.upcoming.len();
        if len > 1 && current.is_some_and(|c| self.upcoming[len - 1] == c.source()) {
            self.upcoming.swap(0, len - 1);
        }
    }

    /// Upcoming sources in pick order
    pub fn upcoming(&self) -> impl Iterator<Item = &str> {
        self.upcoming.iter().rev().map(String::as_str)
    }

    pub fn has_played(&self, source: &str) -> bool {
        self.played.contains(source)
    }
}
