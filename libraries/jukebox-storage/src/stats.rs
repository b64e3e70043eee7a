/// Command usage statistics
use jukebox_core::UserId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::RwLock;

/// Usage counts, global and per user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandStats {
    #[serde(default)]
    pub global: BTreeMap<String, u64>,
    #[serde(default)]
    pub per_user: BTreeMap<UserId, BTreeMap<String, u64>>,
}

impl CommandStats {
    /// Record one invocation
    pub fn record(&mut self, user: UserId, command: &str) {
        *self.global.entry(command.to_string()).or_insert(0) += 1;
        *self
            .per_user
            .entry(user)
            .or_default()
            .entry(command.to_string())
            .or_insert(0) += 1;
    }

    pub fn global_count(&self, command: &str) -> u64 {
        self.global.get(command).copied().unwrap_or(0)
    }

    pub fn user_count(&self, user: UserId, command: &str) -> u64 {
        self.per_user
            .get(&user)
            .and_then(|counts| counts.get(command))
            .copied()
            .unwrap_or(0)
    }
}

/// Thread-safe counter shared by the command surface
#[derive(Default)]
pub struct UsageTracker {
    stats: RwLock<CommandStats>,
}

impl UsageTracker {
    pub fn new(stats: CommandStats) -> Self {
        Self {
            stats: RwLock::new(stats),
        }
    }

    /// Count one invocation. Counts are written on the periodic save.
    pub fn record(&self, user: UserId, command: &str) {
        let mut stats = self
            .stats
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        stats.record(user, command);
    }

    /// Copy of the current counts
    pub fn snapshot(&self) -> CommandStats {
        self.stats
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}
