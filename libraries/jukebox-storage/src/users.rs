/// Per-user enable/disable flags and the global music switch
use crate::persistence::SaveHandle;
use jukebox_core::UserId;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};
use tracing::info;

/// Access flags consulted by the command surface
pub struct UserFlags {
    disabled: RwLock<BTreeSet<UserId>>,
    music_enabled: AtomicBool,
    saver: SaveHandle,
}

impl UserFlags {
    pub fn new(disabled: BTreeSet<UserId>, music_enabled: bool, saver: SaveHandle) -> Self {
        Self {
            disabled: RwLock::new(disabled),
            music_enabled: AtomicBool::new(music_enabled),
            saver,
        }
    }

    pub fn is_disabled(&self, user: UserId) -> bool {
        self.disabled
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&user)
    }

    /// Block a user from running commands. Returns false if already disabled.
    pub fn disable(&self, user: UserId) -> bool {
        let changed = self
            .disabled
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user);
        if changed {
            info!(user = %user, "User disabled");
            self.saver.request_save();
        }
        changed
    }

    /// Lift a block. Returns false if the user was not disabled.
    pub fn enable(&self, user: UserId) -> bool {
        let changed = self
            .disabled
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&user);
        if changed {
            info!(user = %user, "User enabled");
            self.saver.request_save();
        }
        changed
    }

    pub fn music_enabled(&self) -> bool {
        self.music_enabled.load(Ordering::SeqCst)
    }

    /// Flip the global music switch. Returns the previous value.
    pub fn set_music_enabled(&self, enabled: bool) -> bool {
        let previous = self.music_enabled.swap(enabled, Ordering::SeqCst);
        if previous != enabled {
            info!(enabled, "Music switch changed");
            self.saver.request_save();
        }
        previous
    }

    pub fn disabled_users(&self) -> BTreeSet<UserId> {
        self.disabled
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
