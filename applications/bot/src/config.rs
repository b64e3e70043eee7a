/// Bot configuration
use crate::error::{BotError, Result};
use jukebox_core::UserId;
use jukebox_playback::PlaybackConfig;
use jukebox_storage::SaverConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file read when no path is given and it exists
pub const DEFAULT_CONFIG_FILE: &str = "jukebox.toml";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BotConfig {
    #[serde(default = "default_music")]
    pub music: MusicSettings,

    #[serde(default)]
    pub access: AccessSettings,

    #[serde(default = "default_hotkeys")]
    pub hotkeys: HotkeySettings,

    #[serde(default = "default_persistence")]
    pub persistence: PersistenceSettings,

    #[serde(default = "default_transport")]
    pub transport: TransportSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MusicSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Local library root; `None` disables local search
    #[serde(default)]
    pub location: Option<PathBuf>,

    #[serde(default = "default_volume")]
    pub default_volume: f32,

    #[serde(default = "default_max_volume")]
    pub max_volume: f32,

    /// Extensions (without the dot) picked up by library scans
    #[serde(default = "default_supported_formats")]
    pub supported_formats: Vec<String>,

    #[serde(default = "default_true")]
    pub announce_songs: bool,

    /// Apply ReplayGain from local file tags
    #[serde(default = "default_true")]
    pub normalize_local: bool,

    /// Wrap Sequential and Alphabetical at the end of the queue
    #[serde(default)]
    pub repeat_queue: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AccessSettings {
    /// Users allowed to run owner commands; never disabled
    #[serde(default)]
    pub owners: Vec<UserId>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HotkeySettings {
    /// Master switch for every binding
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_volume_step")]
    pub volume_step: f32,

    #[serde(default = "default_skip_binding")]
    pub skip: HotkeyBinding,

    #[serde(default = "default_toggle_pause_binding")]
    pub toggle_pause: HotkeyBinding,

    #[serde(default = "default_volume_up_binding")]
    pub volume_up: HotkeyBinding,

    #[serde(default = "default_volume_down_binding")]
    pub volume_down: HotkeyBinding,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HotkeyBinding {
    #[serde(default)]
    pub enabled: bool,

    pub key: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PersistenceSettings {
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,

    /// Periodic save interval
    #[serde(default = "default_save_interval_secs")]
    pub save_interval_secs: u64,

    /// Quiet period that coalesces save requests
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Start restored sessions playing at startup
    #[serde(default = "default_true")]
    pub resume_on_startup: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransportSettings {
    /// Length assumed for tracks with no known duration
    #[serde(default = "default_track_secs")]
    pub default_track_secs: u64,
}

impl BotConfig {
    /// Load configuration from file and environment
    ///
    /// An explicit `path` must exist; otherwise `jukebox.toml` is read when
    /// present. Environment variables prefixed with `JUKEBOX_` override the
    /// file, with `__` between section and field
    /// (`JUKEBOX_MUSIC__MAX_VOLUME=0.8`, `JUKEBOX_ACCESS__OWNERS=1,2`).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        match path {
            Some(path) => {
                settings = settings.add_source(config::File::from(path).required(true));
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    settings = settings.add_source(config::File::from(default_path));
                }
            }
        }

        settings = settings.add_source(
            config::Environment::with_prefix("JUKEBOX")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("access.owners")
                .with_list_parse_key("music.supported_formats")
                .try_parsing(true),
        );

        let config = settings
            .build()
            .map_err(|e| BotError::Config(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| BotError::Config(e.to_string()))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let music = &self.music;

        if !(music.max_volume.is_finite() && music.max_volume > 0.0 && music.max_volume <= 1.0) {
            return Err(BotError::Config(format!(
                "music.max_volume must be in (0, 1], got {}",
                music.max_volume
            )));
        }

        if !(music.default_volume.is_finite()
            && (0.0..=music.max_volume).contains(&music.default_volume))
        {
            return Err(BotError::Config(format!(
                "music.default_volume must be in [0, {}], got {}",
                music.max_volume, music.default_volume
            )));
        }

        if music.supported_formats.is_empty() {
            return Err(BotError::Config(
                "music.supported_formats must list at least one extension".to_string(),
            ));
        }

        if let Some(location) = &music.location {
            if music.enabled && !location.is_dir() {
                return Err(BotError::Config(format!(
                    "music.location {:?} is not a directory",
                    location
                )));
            }
        }

        let step = self.hotkeys.volume_step;
        if !(step.is_finite() && step > 0.0 && step <= 1.0) {
            return Err(BotError::Config(format!(
                "hotkeys.volume_step must be in (0, 1], got {}",
                step
            )));
        }

        if self.persistence.state_file.as_os_str().is_empty() {
            return Err(BotError::Config(
                "persistence.state_file is required".to_string(),
            ));
        }

        if self.persistence.save_interval_secs == 0 {
            return Err(BotError::Config(
                "persistence.save_interval_secs must be positive".to_string(),
            ));
        }

        if self.transport.default_track_secs == 0 {
            return Err(BotError::Config(
                "transport.default_track_secs must be positive".to_string(),
            ));
        }

        Ok(())
    }

    pub fn is_owner(&self, user: UserId) -> bool {
        self.access.owners.contains(&user)
    }

    pub fn playback_config(&self) -> PlaybackConfig {
        PlaybackConfig {
            default_volume: self.music.default_volume,
            max_volume: self.music.max_volume,
            repeat_queue: self.music.repeat_queue,
        }
    }

    pub fn saver_config(&self) -> SaverConfig {
        SaverConfig {
            debounce: Duration::from_millis(self.persistence.debounce_ms),
            interval: Duration::from_secs(self.persistence.save_interval_secs),
        }
    }

    pub fn default_track_length(&self) -> Duration {
        Duration::from_secs(self.transport.default_track_secs)
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            music: default_music(),
            access: AccessSettings::default(),
            hotkeys: default_hotkeys(),
            persistence: default_persistence(),
            transport: default_transport(),
        }
    }
}

// Default values
fn default_true() -> bool {
    true
}

fn default_music() -> MusicSettings {
    MusicSettings {
        enabled: true,
        location: None,
        default_volume: default_volume(),
        max_volume: default_max_volume(),
        supported_formats: default_supported_formats(),
        announce_songs: true,
        normalize_local: true,
        repeat_queue: false,
    }
}

fn default_volume() -> f32 {
    0.2
}

fn default_max_volume() -> f32 {
    1.0
}

fn default_supported_formats() -> Vec<String> {
    ["mp3", "flac", "wav", "ogg", "m4a"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_hotkeys() -> HotkeySettings {
    HotkeySettings {
        enabled: false,
        volume_step: default_volume_step(),
        skip: default_skip_binding(),
        toggle_pause: default_toggle_pause_binding(),
        volume_up: default_volume_up_binding(),
        volume_down: default_volume_down_binding(),
    }
}

fn default_volume_step() -> f32 {
    0.05
}

fn binding(key: &str) -> HotkeyBinding {
    HotkeyBinding {
        enabled: false,
        key: key.to_string(),
    }
}

fn default_skip_binding() -> HotkeyBinding {
    binding("`")
}

fn default_toggle_pause_binding() -> HotkeyBinding {
    binding("pause")
}

fn default_volume_up_binding() -> HotkeyBinding {
    binding("]")
}

fn default_volume_down_binding() -> HotkeyBinding {
    binding("[")
}

fn default_persistence() -> PersistenceSettings {
    PersistenceSettings {
        state_file: default_state_file(),
        save_interval_secs: default_save_interval_secs(),
        debounce_ms: default_debounce_ms(),
        resume_on_startup: true,
    }
}

fn default_state_file() -> PathBuf {
    PathBuf::from("data.json")
}

fn default_save_interval_secs() -> u64 {
    14 * 60
}

fn default_debounce_ms() -> u64 {
    2000
}

fn default_transport() -> TransportSettings {
    TransportSettings {
        default_track_secs: default_track_secs(),
    }
}

fn default_track_secs() -> u64 {
    180
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = BotConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.music.default_volume, 0.2);
        assert_eq!(config.persistence.save_interval_secs, 840);
        assert_eq!(config.persistence.state_file, PathBuf::from("data.json"));
        assert!(!config.hotkeys.enabled);
    }

    #[test]
    fn default_volume_above_max_is_rejected() {
        let mut config = BotConfig::default();
        config.music.max_volume = 0.5;
        config.music.default_volume = 0.6;
        assert!(matches!(config.validate(), Err(BotError::Config(_))));
    }

    #[test]
    fn zero_volume_step_is_rejected() {
        let mut config = BotConfig::default();
        config.hotkeys.volume_step = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn owners_are_checked_by_id() {
        let mut config = BotConfig::default();
        config.access.owners = vec![UserId::new(7)];
        assert!(config.is_owner(UserId::new(7)));
        assert!(!config.is_owner(UserId::new(8)));
    }
}
