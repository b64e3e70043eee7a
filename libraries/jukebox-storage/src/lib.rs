//! Jukebox Storage
//!
//! Durable state for the bot: the named playlist library, per-user flags,
//! command usage statistics, and the atomic JSON state file that holds all of
//! it together with session snapshots.
//!
//! # Saving
//!
//! Mutating stores never write to disk themselves. They call
//! [`SaveHandle::request_save`], and a single [`Saver`] task coalesces
//! requests, saves periodically, and flushes on shutdown.
//!
//! ```rust,no_run
//! use jukebox_storage::{PersistenceManager, PersistedState};
//!
//! # async fn example() -> jukebox_storage::Result<()> {
//! let manager = PersistenceManager::new("data.json");
//! let state = manager.load_or_default().await;
//! manager.save(&state).await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod persistence;
pub mod playlists;
pub mod state;
pub mod stats;
pub mod users;

pub use error::{Result, StorageError};
pub use persistence::{PersistenceManager, SaveHandle, SaveRequests, Saver, SaverConfig, StateSource};
pub use playlists::PlaylistStore;
pub use state::{PersistedState, STATE_VERSION};
pub use stats::{CommandStats, UsageTracker};
pub use users::UserFlags;
