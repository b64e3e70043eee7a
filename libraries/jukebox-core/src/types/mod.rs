mod ids;
mod mode;
mod playlist;
mod session;
mod track;

pub use ids::{ChannelId, Generation, UserId};
pub use mode::Mode;
pub use playlist::{Playlist, PlaylistSummary};
pub use session::SessionSnapshot;
pub use track::{SourceKind, TrackDescriptor};
