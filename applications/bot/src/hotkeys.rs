//! Global hotkeys
//!
//! Key presses arrive on a non-runtime thread with no channel attached, so
//! they act on the most recently active session and only ever enqueue a
//! command (no awaiting).

use crate::app::Services;
use crate::config::{HotkeyBinding, HotkeySettings};
use jukebox_playback::Command;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

/// What a hotkey does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HotkeyAction {
    Skip,
    TogglePause,
    VolumeUp,
    VolumeDown,
}

impl HotkeyAction {
    pub const ALL: [Self; 4] = [
        Self::Skip,
        Self::TogglePause,
        Self::VolumeUp,
        Self::VolumeDown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Skip => "skip",
            Self::TogglePause => "toggle_pause",
            Self::VolumeUp => "volume_up",
            Self::VolumeDown => "volume_down",
        }
    }

    fn binding(self, settings: &HotkeySettings) -> &HotkeyBinding {
        match self {
            Self::Skip => &settings.skip,
            Self::TogglePause => &settings.toggle_pause,
            Self::VolumeUp => &settings.volume_up,
            Self::VolumeDown => &settings.volume_down,
        }
    }
}

impl fmt::Display for HotkeyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HotkeyAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "skip" | "mskip" => Ok(Self::Skip),
            "toggle_pause" | "pause" | "mpause" => Ok(Self::TogglePause),
            "volume_up" | "volup" | "mvolup" => Ok(Self::VolumeUp),
            "volume_down" | "voldown" | "mvoldown" => Ok(Self::VolumeDown),
            other => Err(format!("unknown hotkey action: {}", other)),
        }
    }
}

/// Translates key presses into session commands
#[derive(Clone)]
pub struct HotkeyDispatcher {
    services: Services,
}

impl HotkeyDispatcher {
    pub fn new(services: Services) -> Self {
        Self { services }
    }

    fn settings(&self) -> &HotkeySettings {
        &self.services.config.hotkeys
    }

    /// Whether `action` is switched on in configuration
    pub fn is_enabled(&self, action: HotkeyAction) -> bool {
        self.settings().enabled && action.binding(self.settings()).enabled
    }

    /// Enabled action bound to `key`
    pub fn action_for_key(&self, key: &str) -> Option<HotkeyAction> {
        HotkeyAction::ALL
            .into_iter()
            .find(|action| self.is_enabled(*action) && action.binding(self.settings()).key == key)
    }

    /// Enabled bindings, for logging at startup
    pub fn bindings(&self) -> Vec<(HotkeyAction, String)> {
        HotkeyAction::ALL
            .into_iter()
            .filter(|action| self.is_enabled(*action))
            .map(|action| (action, action.binding(self.settings()).key.clone()))
            .collect()
    }

    /// Submit `action` to the most recently active session
    ///
    /// Safe to call from any thread. Returns whether a command was submitted;
    /// disabled actions, music being off, or having no session are no-ops.
    pub fn press(&self, action: HotkeyAction) -> bool {
        if !self.is_enabled(action) {
            debug!(action = %action, "Hotkey disabled");
            return false;
        }

        if !self.services.users.music_enabled() {
            debug!(action = %action, "Hotkey ignored, music disabled");
            return false;
        }

        let Some(session) = self.services.registry.most_recent() else {
            debug!(action = %action, "Hotkey ignored, no active session");
            return false;
        };

        let step = self.settings().volume_step;
        let command = match action {
            HotkeyAction::Skip => Command::Skip,
            HotkeyAction::TogglePause => Command::TogglePause,
            HotkeyAction::VolumeUp => Command::AdjustVolume(step),
            HotkeyAction::VolumeDown => Command::AdjustVolume(-step),
        };

        match session.send(command) {
            Ok(()) => {
                info!(action = %action, channel = %session.channel(), "Hotkey submitted");
                true
            }
            Err(e) => {
                debug!(action = %action, error = %e, "Hotkey target closed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actions_round_trip_through_names() {
        for action in HotkeyAction::ALL {
            assert_eq!(action.as_str().parse::<HotkeyAction>(), Ok(action));
        }
        assert_eq!("mvolup".parse::<HotkeyAction>(), Ok(HotkeyAction::VolumeUp));
        assert!("explode".parse::<HotkeyAction>().is_err());
    }
}
