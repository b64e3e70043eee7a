//! Chat command surface
//!
//! Parses `!`-prefixed chat lines, applies the access checks, resolves
//! queries, and turns every outcome into a [`CommandReply`] carrying one of
//! the five result codes. Session work goes through the registry; nothing
//! here touches a queue directly.

use crate::app::Services;
use jukebox_core::{
    ChannelId, JukeboxError, Resolver, ResultCode, TrackDescriptor, TransportError, UserId,
};
use jukebox_playback::{
    Command, CommandOutput, EnqueuePosition, EnqueueReport, PlaybackError, PlaybackState,
    SessionHandle, SessionStatus,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Prefix marking a chat line as a command
pub const PREFIX: char = '!';

/// Entries shown by `!queue`
const QUEUE_PAGE: usize = 10;

/// Who ran a command, and where
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandContext {
    pub user: UserId,
    pub channel: ChannelId,
}

/// Answer sent back to chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReply {
    pub code: ResultCode,
    pub message: String,
}

impl CommandReply {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            code: ResultCode::Success,
            message: message.into(),
        }
    }

    pub fn error(err: &JukeboxError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code.is_success()
    }
}

/// A parsed chat command
#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    /// `!m` / `!msearch <query>`
    Search(String),
    Queue,
    NowPlaying,
    Skip,
    PausePlay,
    /// Percentage of the configured maximum
    Volume(u8),
    Clear,
    /// Cycle the playback mode
    Shuffle,
    /// 1-based position in insertion order
    Jump(usize),
    /// 1-based position in insertion order
    Remove(usize),
    PlaylistSave(String),
    PlaylistLoad(String),
    PlaylistList,
    PlaylistDelete(String),
    MusicOn,
    MusicOff,
    Enable(UserId),
    Disable(UserId),
    Shutdown,
    Commands,
}

impl ChatCommand {
    /// Parse a chat line; `None` if it is not a command at all
    pub fn parse(line: &str) -> Option<Result<Self, JukeboxError>> {
        let body = line.trim().strip_prefix(PREFIX)?;
        let (name, args) = body
            .split_once(char::is_whitespace)
            .map_or((body, ""), |(name, args)| (name, args.trim()));
        if name.is_empty() {
            return None;
        }
        Some(Self::from_parts(&name.to_lowercase(), args))
    }

    fn from_parts(name: &str, args: &str) -> Result<Self, JukeboxError> {
        match name {
            "m" | "msearch" => required(args, "!msearch <query>").map(Self::Search),
            "q" | "queue" => Ok(Self::Queue),
            "np" | "nowplaying" => Ok(Self::NowPlaying),
            "mskip" => Ok(Self::Skip),
            "mpp" | "mpauseplay" => Ok(Self::PausePlay),
            "vol" | "volume" => args
                .parse::<u8>()
                .ok()
                .filter(|level| *level <= 100)
                .map(Self::Volume)
                .ok_or_else(|| JukeboxError::invalid_argument("Volume must be between 0 and 100")),
            "mclear" => Ok(Self::Clear),
            "mshuffle" => Ok(Self::Shuffle),
            "jump" => position(args, "!jump <n>").map(Self::Jump),
            "remove" => position(args, "!remove <n>").map(Self::Remove),
            "playlist" => Self::parse_playlist(args),
            "mon" => Ok(Self::MusicOn),
            "moff" => Ok(Self::MusicOff),
            "enable" => user(args, "!enable <user>").map(Self::Enable),
            "disable" => user(args, "!disable <user>").map(Self::Disable),
            "shutdown" => Ok(Self::Shutdown),
            "commands" => Ok(Self::Commands),
            other => Err(JukeboxError::invalid_argument(format!(
                "Unknown command: {}{}",
                PREFIX, other
            ))),
        }
    }

    fn parse_playlist(args: &str) -> Result<Self, JukeboxError> {
        const USAGE: &str = "!playlist save|load|list|delete <name>";

        let (action, name) = args
            .split_once(char::is_whitespace)
            .map_or((args, ""), |(action, name)| (action, name.trim()));

        match action.to_lowercase().as_str() {
            "save" => required(name, "!playlist save <name>").map(Self::PlaylistSave),
            "load" => required(name, "!playlist load <name>").map(Self::PlaylistLoad),
            "list" => Ok(Self::PlaylistList),
            "delete" => required(name, "!playlist delete <name>").map(Self::PlaylistDelete),
            _ => Err(usage(USAGE)),
        }
    }

    /// Canonical name used in usage statistics
    pub fn name(&self) -> &'static str {
        match self {
            Self::Search(_) => "!msearch",
            Self::Queue => "!queue",
            Self::NowPlaying => "!nowplaying",
            Self::Skip => "!mskip",
            Self::PausePlay => "!mpauseplay",
            Self::Volume(_) => "!volume",
            Self::Clear => "!mclear",
            Self::Shuffle => "!mshuffle",
            Self::Jump(_) => "!jump",
            Self::Remove(_) => "!remove",
            Self::PlaylistSave(_)
            | Self::PlaylistLoad(_)
            | Self::PlaylistList
            | Self::PlaylistDelete(_) => "!playlist",
            Self::MusicOn => "!mon",
            Self::MusicOff => "!moff",
            Self::Enable(_) => "!enable",
            Self::Disable(_) => "!disable",
            Self::Shutdown => "!shutdown",
            Self::Commands => "!commands",
        }
    }

    /// Whether the command needs music features switched on
    pub fn is_music(&self) -> bool {
        !matches!(
            self,
            Self::MusicOn
                | Self::MusicOff
                | Self::Enable(_)
                | Self::Disable(_)
                | Self::Shutdown
                | Self::Commands
        )
    }

    /// Whether only configured owners may run it
    pub fn owner_only(&self) -> bool {
        matches!(
            self,
            Self::MusicOn | Self::MusicOff | Self::Enable(_) | Self::Disable(_) | Self::Shutdown
        )
    }
}

fn usage(text: &str) -> JukeboxError {
    JukeboxError::invalid_argument(format!("Usage: {}", text))
}

fn required(args: &str, text: &str) -> Result<String, JukeboxError> {
    if args.is_empty() {
        Err(usage(text))
    } else {
        Ok(args.to_string())
    }
}

fn position(args: &str, text: &str) -> Result<usize, JukeboxError> {
    args.parse::<usize>()
        .ok()
        .filter(|n| *n >= 1)
        .ok_or_else(|| usage(text))
}

fn user(args: &str, text: &str) -> Result<UserId, JukeboxError> {
    args.parse().map_err(|_| usage(text))
}

/// Executes chat commands against the registry and stores
pub struct CommandSurface {
    services: Services,
    resolver: Arc<dyn Resolver>,
}

impl CommandSurface {
    pub fn new(services: Services, resolver: Arc<dyn Resolver>) -> Self {
        Self { services, resolver }
    }

    /// Handle one chat line; `None` if the line is not a command
    pub async fn handle_line(&self, ctx: CommandContext, line: &str) -> Option<CommandReply> {
        let reply = match ChatCommand::parse(line)? {
            Ok(command) => self.execute(ctx, command).await,
            Err(e) => CommandReply::error(&e),
        };
        Some(reply)
    }

    /// Run a parsed command on behalf of `ctx.user`
    pub async fn execute(&self, ctx: CommandContext, command: ChatCommand) -> CommandReply {
        if let Err(e) = self.authorize(ctx.user, &command) {
            debug!(user = %ctx.user, command = command.name(), error = %e, "Command refused");
            return CommandReply::error(&e);
        }

        if command.is_music() {
            self.services.usage.record(ctx.user, command.name());
        }

        let name = command.name();
        match self.run(ctx, command).await {
            Ok(message) => CommandReply::success(message),
            Err(e) => {
                debug!(user = %ctx.user, channel = %ctx.channel, command = name, error = %e, "Command failed");
                CommandReply::error(&e)
            }
        }
    }

    fn authorize(&self, user: UserId, command: &ChatCommand) -> Result<(), JukeboxError> {
        let owner = self.services.config.is_owner(user);

        if !owner && self.services.users.is_disabled(user) {
            return Err(JukeboxError::permission_denied(
                "you are disabled from using commands",
            ));
        }

        if command.owner_only() && !owner {
            return Err(JukeboxError::permission_denied(format!(
                "{} is restricted to owners",
                command.name()
            )));
        }

        if command.is_music() && !self.services.users.music_enabled() {
            return Err(TransportError::Unavailable(
                "music features are disabled".to_string(),
            )
            .into());
        }

        Ok(())
    }

    async fn run(&self, ctx: CommandContext, command: ChatCommand) -> Result<String, JukeboxError> {
        match command {
            ChatCommand::Search(query) => {
                let tracks = self.resolver.resolve(&query).await?;
                self.enqueue(ctx.channel, tracks).await
            }
            ChatCommand::Queue => Ok(match self.status(ctx.channel).await? {
                Some(status) => format_queue(&status),
                None => "The queue is empty.".to_string(),
            }),
            ChatCommand::NowPlaying => Ok(self
                .status(ctx.channel)
                .await?
                .as_ref()
                .and_then(format_now_playing)
                .unwrap_or_else(|| "Nothing is playing.".to_string())),
            ChatCommand::Skip => {
                let output = self.session(ctx.channel)?.execute(Command::Skip).await?;
                Ok(format!("Skipped. {}", describe(output)))
            }
            ChatCommand::PausePlay => self.submit(ctx.channel, Command::TogglePause).await,
            ChatCommand::Volume(level) => {
                let volume = f32::from(level) / 100.0 * self.services.config.music.max_volume;
                self.session(ctx.channel)?
                    .execute(Command::SetVolume(volume))
                    .await?;
                Ok(format!("Volume set to {}%", level))
            }
            ChatCommand::Clear => {
                self.submit(ctx.channel, Command::ClearAndStop).await?;
                Ok("Queue cleared.".to_string())
            }
            ChatCommand::Shuffle => self.submit(ctx.channel, Command::CycleMode).await,
            ChatCommand::Jump(n) => self.submit(ctx.channel, Command::JumpTo(n - 1)).await,
            ChatCommand::Remove(n) => self.submit(ctx.channel, Command::Remove(n - 1)).await,
            ChatCommand::PlaylistSave(name) => {
                let tracks = self
                    .status(ctx.channel)
                    .await?
                    .map(|status| status.tracks)
                    .unwrap_or_default();
                if tracks.is_empty() {
                    return Err(PlaybackError::QueueEmpty.into());
                }
                let summary = self
                    .services
                    .playlists
                    .save(&name, tracks, Some(ctx.user))?;
                Ok(format!(
                    "Playlist **{}** saved with {} songs.",
                    summary.name, summary.track_count
                ))
            }
            ChatCommand::PlaylistLoad(name) => {
                let tracks = self.services.playlists.load(&name)?;
                let message = self.enqueue(ctx.channel, tracks).await?;
                Ok(format!("Playlist **{}** loaded. {}", name, message))
            }
            ChatCommand::PlaylistList => Ok(self.format_playlists()),
            ChatCommand::PlaylistDelete(name) => {
                self.services.playlists.delete(&name)?;
                Ok(format!("Playlist **{}** deleted.", name))
            }
            ChatCommand::MusicOn => {
                if self.services.users.set_music_enabled(true) {
                    return Ok("Music features are already enabled.".to_string());
                }
                warn!(user = %ctx.user, "Music features enabled");
                Ok("Music features have been **ENABLED**.".to_string())
            }
            ChatCommand::MusicOff => {
                if !self.services.users.set_music_enabled(false) {
                    return Ok("Music features are already disabled.".to_string());
                }
                warn!(user = %ctx.user, "Music features disabled");
                self.clear_all().await;
                Ok("Music features have been **DISABLED**.".to_string())
            }
            ChatCommand::Enable(target) => Ok(if self.services.users.enable(target) {
                format!("<@{}> has been **enabled**.", target)
            } else {
                format!("<@{}> is not disabled.", target)
            }),
            ChatCommand::Disable(target) => {
                if self.services.config.is_owner(target) {
                    return Err(JukeboxError::invalid_argument("owners cannot be disabled"));
                }
                Ok(if self.services.users.disable(target) {
                    format!("<@{}> has been **disabled** from using commands.", target)
                } else {
                    format!("<@{}> is already disabled.", target)
                })
            }
            ChatCommand::Shutdown => {
                info!(user = %ctx.user, "Shutdown requested");
                self.services.shutdown.notify_one();
                Ok("Bot is shutting down...".to_string())
            }
            ChatCommand::Commands => Ok(help_text()),
        }
    }

    fn session(&self, channel: ChannelId) -> Result<SessionHandle, JukeboxError> {
        self.services
            .registry
            .get(channel)
            .ok_or_else(|| PlaybackError::NothingPlaying.into())
    }

    async fn submit(&self, channel: ChannelId, command: Command) -> Result<String, JukeboxError> {
        let output = self.session(channel)?.execute(command).await?;
        Ok(describe(output))
    }

    async fn status(&self, channel: ChannelId) -> Result<Option<SessionStatus>, JukeboxError> {
        let Some(session) = self.services.registry.get(channel) else {
            return Ok(None);
        };
        match session.execute(Command::Status).await {
            Ok(CommandOutput::Status(status)) => Ok(Some(*status)),
            Ok(_) | Err(PlaybackError::SessionClosed(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn enqueue(
        &self,
        channel: ChannelId,
        tracks: Vec<TrackDescriptor>,
    ) -> Result<String, JukeboxError> {
        let output = self
            .services
            .registry
            .enqueue(channel, tracks, EnqueuePosition::End)
            .await?;
        Ok(describe(output))
    }

    async fn clear_all(&self) {
        let registry = &self.services.registry;
        for channel in registry.channels() {
            let Some(session) = registry.get(channel) else {
                continue;
            };
            if let Err(e) = session.execute(Command::ClearAndStop).await {
                debug!(channel = %channel, error = %e, "Session already closed");
            }
        }
    }

    fn format_playlists(&self) -> String {
        let playlists = self.services.playlists.list();
        if playlists.is_empty() {
            return "No saved playlists.".to_string();
        }

        let mut out = String::from("Saved playlists:");
        for playlist in playlists {
            out.push_str(&format!(
                "\n• **{}**: {} songs (updated {})",
                playlist.name,
                playlist.track_count,
                playlist.updated_at.format("%Y-%m-%d")
            ));
        }
        out
    }
}

fn enqueue_message(report: EnqueueReport, started: Option<&TrackDescriptor>) -> String {
    let mut message = format!("Added **{}** songs to the queue.", report.added);
    if report.skipped > 0 {
        message.push_str(&format!(" ({} duplicates skipped)", report.skipped));
    }
    if let Some(track) = started {
        message.push_str(&format!(" Now playing **{}**.", track.title()));
    }
    message
}

/// Chat text for a command outcome
fn describe(output: CommandOutput) -> String {
    match output {
        CommandOutput::Playing(track) => format!("Now playing **{}**.", track.title()),
        CommandOutput::Paused => "Paused.".to_string(),
        CommandOutput::Volume(volume) => format!("Volume is {:.0}%.", volume * 100.0),
        CommandOutput::Mode(mode) => format!("Music mode is now **{}**.", mode),
        CommandOutput::Enqueued { report, started } => enqueue_message(report, started.as_ref()),
        CommandOutput::Removed(track) => format!("Removed **{}**.", track.title()),
        CommandOutput::Status(status) => {
            format_now_playing(&status).unwrap_or_else(|| "Nothing is playing.".to_string())
        }
        CommandOutput::Snapshot(snapshot) => format!("{} tracks queued.", snapshot.tracks.len()),
        CommandOutput::Finished => "The queue has finished.".to_string(),
        CommandOutput::Stale => "Nothing changed.".to_string(),
    }
}

fn format_now_playing(status: &SessionStatus) -> Option<String> {
    let track = status.current.as_ref()?;
    let state = match status.state {
        PlaybackState::Playing => "Now playing",
        PlaybackState::Paused => "Paused",
        PlaybackState::Stopped => "Up next",
    };
    Some(format!(
        "{}: **{}** [{} | volume {:.0}%]",
        state,
        track.title(),
        status.mode,
        status.volume * 100.0
    ))
}

fn format_queue(status: &SessionStatus) -> String {
    let mut out = format!(
        "Queue ({}, {} tracks):",
        status.mode,
        status.tracks.len()
    );

    for track in status.view.iter().take(QUEUE_PAGE) {
        // Numbers follow insertion order so they work with !jump and !remove
        let index = status
            .tracks
            .iter()
            .position(|t| t == track)
            .unwrap_or_default();
        let marker = if status.cursor == Some(index) { "▶" } else { " " };
        out.push_str(&format!("\n{} {}. {}", marker, index + 1, track.title()));
    }

    if status.view.len() > QUEUE_PAGE {
        out.push_str(&format!("\n...and {} more", status.view.len() - QUEUE_PAGE));
    }
    out
}

fn help_text() -> String {
    [
        "Music commands:",
        "`!m <query or url>` search and queue",
        "`!q` show the queue, `!np` now playing",
        "`!mskip` skip, `!mpp` pause or resume",
        "`!vol <0-100>` set volume",
        "`!mshuffle` cycle playback mode",
        "`!jump <n>` play entry n, `!remove <n>` remove entry n",
        "`!mclear` clear the queue and leave",
        "`!playlist save|load|list|delete <name>`",
        "Owner commands: `!mon`, `!moff`, `!enable <user>`, `!disable <user>`, `!shutdown`",
    ]
    .join("\n")
}
