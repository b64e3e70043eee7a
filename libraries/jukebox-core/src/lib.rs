//! Jukebox Core
//!
//! Platform-agnostic core types, collaborator traits, and error handling for the
//! Jukebox voice-channel bot.
//!
//! # Architecture
//!
//! The core crate defines:
//! - **Domain Types**: `TrackDescriptor`, `Mode`, `Playlist`, `SessionSnapshot`
//! - **Collaborator Traits**: `Resolver`, `AudioTransport`
//! - **Error Handling**: Unified `JukeboxError`, `Result`, and the `ResultCode`
//!   reported back to chat
//!
//! # Example
//!
//! ```rust
//! use jukebox_core::{Mode, TrackDescriptor};
//! use std::time::Duration;
//!
//! let track = TrackDescriptor::local("Intro", "/music/intro.flac")
//!     .with_duration(Duration::from_secs(95));
//! assert!(track.is_local());
//!
//! assert_eq!(Mode::Sequential.next(), Mode::Shuffle);
//! ```

#![forbid(unsafe_code)]

pub mod error;
pub mod traits;
pub mod types;

pub use error::{JukeboxError, ResolveError, Result, ResultCode, TransportError};
pub use traits::{AudioTransport, Resolver, TransportEvent, TransportEventKind};
pub use types::{
    ChannelId, Generation, Mode, Playlist, PlaylistSummary, SessionSnapshot, SourceKind,
    TrackDescriptor, UserId,
};
