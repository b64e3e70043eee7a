//! Shared helpers for bot integration tests
#![allow(dead_code)]

use jukebox_bot::{App, BotConfig, CommandContext, CommandReply};
use jukebox_core::{ChannelId, UserId};
use std::path::Path;

pub const OWNER: UserId = UserId::new(1);
pub const LISTENER: UserId = UserId::new(2);

/// Config with its state file under `dir` and long default tracks
pub fn test_config(dir: &Path) -> BotConfig {
    let mut config = BotConfig::default();
    config.access.owners = vec![OWNER];
    config.persistence.state_file = dir.join("data.json");
    config.persistence.debounce_ms = 20;
    config.transport.default_track_secs = 600;
    config
}

pub async fn start(dir: &Path) -> App {
    App::start(test_config(dir)).await.unwrap()
}

pub fn ctx(user: UserId, channel: u64) -> CommandContext {
    CommandContext {
        user,
        channel: ChannelId::new(channel),
    }
}

/// Run one chat line and return its reply
pub async fn say(app: &App, ctx: CommandContext, line: &str) -> CommandReply {
    app.surface()
        .handle_line(ctx, line)
        .await
        .expect("line should parse as a command")
}
