/// Playback mode selecting the next track
use serde::{Deserialize, Serialize};
use std::fmt;

/// Session-global selection policy
///
/// Modes never reorder the stored queue; they only decide which entry the
/// cursor moves to next.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Insertion order
    #[default]
    Sequential,
    /// Random permutation, no repeats within a cycle
    Shuffle,
    /// Ordered by case-insensitive title
    Alphabetical,
    /// Repeat the current track
    Loop,
}

impl Mode {
    /// Next mode in the cycle Sequential → Shuffle → Alphabetical → Loop → Sequential
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::Sequential => Self::Shuffle,
            Self::Shuffle => Self::Alphabetical,
            Self::Alphabetical => Self::Loop,
            Self::Loop => Self::Sequential,
        }
    }

    /// Human readable label
    pub const fn label(self) -> &'static str {
        match self {
            Self::Sequential => "Sequential",
            Self::Shuffle => "Shuffle",
            Self::Alphabetical => "Alphabetical",
            Self::Loop => "Loop",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
