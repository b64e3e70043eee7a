//! Session volume
//!
//! Volume is a linear factor in 0.0-1.0, capped by the configured maximum.
//! Per-track loudness normalization is applied on top when a track is handed
//! to the transport.

use crate::error::{PlaybackError, Result};

/// Volume level with an upper bound
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Volume {
    level: f32,
    max: f32,
}

impl Volume {
    /// Create a volume, clamping `level` into `0.0..=max`
    pub fn new(level: f32, max: f32) -> Self {
        let max = if max.is_finite() { max.clamp(0.0, 1.0) } else { 1.0 };
        let level = if level.is_finite() { level.clamp(0.0, max) } else { max };
        Self { level, max }
    }

    /// Current level
    pub fn level(&self) -> f32 {
        self.level
    }

    /// Configured maximum
    pub fn max(&self) -> f32 {
        self.max
    }

    /// Set an absolute level
    ///
    /// Values above the maximum are clamped to it.
    ///
    /// # Errors
    /// `InvalidVolume` if `level` is not a number in 0.0-1.0
    pub fn set(&mut self, level: f32) -> Result<f32> {
        if !level.is_finite() || !(0.0..=1.0).contains(&level) {
            return Err(PlaybackError::InvalidVolume(level));
        }
        self.level = level.min(self.max);
        Ok(self.level)
    }

    /// Step the level up or down, clamped into `0.0..=max`
    pub fn adjust(&mut self, delta: f32) -> f32 {
        if delta.is_finite() {
            self.level = (self.level + delta).clamp(0.0, self.max);
        }
        self.level
    }

    /// Level sent to the transport for a track with the given gain
    pub fn effective(&self, normalization_gain: Option<f32>) -> f32 {
        (self.level * normalization_gain.unwrap_or(1.0)).clamp(0.0, 1.0)
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self::new(0.2, 1.0)
    }
}
