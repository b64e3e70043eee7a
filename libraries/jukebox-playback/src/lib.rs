//! Jukebox - Playback Management
//!
//! Per-channel playback and queue management for the Jukebox bot.
//!
//! This crate provides:
//! - The session queue (insertion-ordered tracks plus a cursor)
//! - Playback modes: Sequential, Shuffle, Alphabetical, Loop
//! - One controller actor per channel, serializing every input surface
//! - A registry with a most-recently-active pointer for hotkeys
//! - Auto-advance on transport track-end/failure notifications
//!
//! # Architecture
//!
//! `jukebox-playback` never talks to a chat platform or decodes audio. The
//! voice transport is reached through [`jukebox_core::AudioTransport`] and
//! reports back through [`TransportEvent`](jukebox_core::TransportEvent)s,
//! which the [`AutoAdvanceCoordinator`] routes to the owning session.
//!
//! # Example: Queue and modes
//!
//! ```rust
//! use jukebox_core::{Mode, TrackDescriptor};
//! use jukebox_playback::{EnqueuePosition, PlaybackConfig, SessionQueue};
//!
//! let mut queue = SessionQueue::new(&PlaybackConfig::default());
//! queue.enqueue(
//!     vec![
//!         TrackDescriptor::local("B-side", "/music/b.mp3"),
//!         TrackDescriptor::local("A-side", "/music/a.mp3"),
//!     ],
//!     EnqueuePosition::End,
//! );
//!
//! queue.set_mode(Mode::Alphabetical);
//! assert_eq!(queue.advance().unwrap().title(), "A-side");
//! assert_eq!(queue.advance().unwrap().title(), "B-side");
//! assert!(queue.advance().is_none());
//! ```

pub mod advance;
pub mod controller;
pub mod error;
pub mod events;
pub mod queue;
pub mod registry;
pub mod shuffle;
pub mod types;
pub mod volume;

pub use advance::AutoAdvanceCoordinator;
pub use controller::{Command, CommandOutput, PendingReply, SessionHandle};
pub use error::{PlaybackError, Result};
pub use events::{CloseReason, SessionEvent};
pub use queue::SessionQueue;
pub use registry::SessionRegistry;
pub use shuffle::ShuffleCycle;
pub use types::{EnqueuePosition, EnqueueReport, PlaybackConfig, PlaybackState, SessionStatus};
pub use volume::Volume;
