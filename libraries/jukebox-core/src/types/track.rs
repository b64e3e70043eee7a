/// Track descriptor: one playable item
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use std::time::Duration;

/// Where a track's audio comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Resolved from a remote catalog and streamed by the transport
    StreamedRemote,
    /// File in the local music library
    LocalFile,
}

/// Immutable description of a playable item.
///
/// Descriptors are cloned into queues and playlists and never mutated.
/// Two descriptors are equal when they point at the same `source`,
/// regardless of title or metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackDescriptor {
    title: String,
    kind: SourceKind,
    source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    duration_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    normalization_gain: Option<f32>,
}

impl TrackDescriptor {
    /// Create a descriptor for a remote stream
    pub fn remote(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            kind: SourceKind::StreamedRemote,
            source: url.into(),
            duration_secs: None,
            normalization_gain: None,
        }
    }

    /// Create a descriptor for a local file
    pub fn local(title: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            kind: SourceKind::LocalFile,
            source: path.into(),
            duration_secs: None,
            normalization_gain: None,
        }
    }

    /// Attach a known duration (whole seconds)
    #[must_use]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_secs = Some(duration.as_secs());
        self
    }

    /// Attach a linear loudness gain.
    ///
    /// Only local files carry normalization; the gain is ignored for remote
    /// streams and non-finite or non-positive values.
    #[must_use]
    pub fn with_normalization_gain(mut self, gain: f32) -> Self {
        if self.kind == SourceKind::LocalFile && gain.is_finite() && gain > 0.0 {
            self.normalization_gain = Some(gain);
        }
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    /// URI or filesystem path; the identity of the track
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration_secs.map(Duration::from_secs)
    }

    pub fn normalization_gain(&self) -> Option<f32> {
        self.normalization_gain
    }

    pub fn is_local(&self) -> bool {
        self.kind == SourceKind::LocalFile
    }

    /// Sort key used by alphabetical mode
    pub fn sort_title(&self) -> String {
        self.title.to_lowercase()
    }
}

impl PartialEq for TrackDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for TrackDescriptor {}

impl Hash for TrackDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.source.hash(state);
    }
}
