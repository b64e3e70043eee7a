/// Persistable view of one channel's session
use super::{ChannelId, Mode, TrackDescriptor};
use serde::{Deserialize, Serialize};

/// Snapshot of a session queue, written to the state file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub channel: ChannelId,
    pub tracks: Vec<TrackDescriptor>,
    #[serde(default)]
    pub cursor: Option<usize>,
    #[serde(default)]
    pub mode: Mode,
    pub volume: f32,
    #[serde(default)]
    pub repeat_queue: bool,
}

impl SessionSnapshot {
    /// Check the snapshot's invariants before restoring it.
    ///
    /// Returns a description of the first violation found.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(cursor) = self.cursor {
            if cursor >= self.tracks.len() {
                return Err(format!(
                    "cursor {} out of range for {} tracks",
                    cursor,
                    self.tracks.len()
                ));
            }
        }

        if !(0.0..=1.0).contains(&self.volume) {
            return Err(format!("volume {} outside 0.0-1.0", self.volume));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(cursor: Option<usize>, volume: f32) -> SessionSnapshot {
        SessionSnapshot {
            channel: ChannelId::new(1),
            tracks: vec![
                TrackDescriptor::local("A", "/a.mp3"),
                TrackDescriptor::local("B", "/b.mp3"),
            ],
            cursor,
            mode: Mode::Sequential,
            volume,
            repeat_queue: false,
        }
    }

    #[test]
    fn validate_accepts_in_range() {
        assert!(snapshot(None, 0.2).validate().is_ok());
        assert!(snapshot(Some(1), 1.0).validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_cursor_and_volume() {
        assert!(snapshot(Some(2), 0.2).validate().is_err());
        assert!(snapshot(Some(0), 1.5).validate().is_err());
        assert!(snapshot(None, -0.1).validate().is_err());
    }
}
