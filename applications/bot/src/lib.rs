//! Jukebox Bot
//!
//! Chat-facing side of the jukebox: configuration, the `!` command surface,
//! global hotkeys, the local library resolver, and a timer-driven voice
//! transport, wired together by [`app::App`].

pub mod app;
pub mod commands;
pub mod config;
pub mod error;
pub mod hotkeys;
pub mod resolver;
pub mod transport;

pub use app::{App, Services};
pub use commands::{ChatCommand, CommandContext, CommandReply, CommandSurface};
pub use config::BotConfig;
pub use error::{BotError, Result};
pub use hotkeys::{HotkeyAction, HotkeyDispatcher};
pub use resolver::{LibraryConfig, LibraryResolver};
pub use transport::SimulatedTransport;
