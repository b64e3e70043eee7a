//! Query resolution
//!
//! URLs resolve to a single remote stream. Anything else is matched against
//! an in-memory index of the local music library, built by walking the library
//! root and reading tags with lofty.

use async_trait::async_trait;
use jukebox_core::{JukeboxError, ResolveError, Resolver, TrackDescriptor};
use lofty::{AudioFile, TaggedFileExt};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Library scan settings
#[derive(Debug, Clone)]
pub struct LibraryConfig {
    /// Library root; `None` means no local library
    pub root: Option<PathBuf>,

    /// Lowercase extensions without the dot
    pub extensions: Vec<String>,

    /// Attach ReplayGain as a normalization gain
    pub normalize: bool,
}

/// One indexed local file
#[derive(Debug, Clone)]
struct LibraryEntry {
    path: PathBuf,
    title: Option<String>,
    artist: Option<String>,
    album: Option<String>,
    duration: Option<Duration>,
    replay_gain_db: Option<f32>,
    search_key: String,
}

impl LibraryEntry {
    fn read(path: &Path) -> Self {
        let mut entry = Self {
            path: path.to_path_buf(),
            title: None,
            artist: None,
            album: None,
            duration: None,
            replay_gain_db: None,
            search_key: String::new(),
        };

        match lofty::read_from_path(path) {
            Ok(tagged_file) => {
                let duration = tagged_file.properties().duration();
                entry.duration = (!duration.is_zero()).then_some(duration);

                if let Some(tag) = tagged_file
                    .primary_tag()
                    .or_else(|| tagged_file.tags().first())
                {
                    entry.apply_tag(tag);
                }
            }
            Err(e) => debug!(path = %path.display(), error = %e, "No readable tags"),
        }

        entry.search_key = [
            Some(file_name(path)),
            entry.artist.as_deref(),
            entry.title.as_deref(),
            entry.album.as_deref(),
        ]
        .into_iter()
        .flatten()
        .map(normalize_term)
        .collect();

        entry
    }

    fn apply_tag(&mut self, tag: &lofty::Tag) {
        for item in tag.items() {
            let text = item.value().text().map(str::trim).filter(|t| !t.is_empty());
            match item.key() {
                lofty::ItemKey::TrackTitle => self.title = text.map(String::from),
                lofty::ItemKey::TrackArtist => self.artist = text.map(String::from),
                lofty::ItemKey::AlbumTitle => self.album = text.map(String::from),
                lofty::ItemKey::ReplayGainTrackGain => {
                    self.replay_gain_db = text.and_then(parse_replaygain);
                }
                _ => {}
            }
        }
    }

    /// "Title - Artist", the bare title, or the file name
    fn display_title(&self) -> String {
        match (&self.title, &self.artist) {
            (Some(title), Some(artist)) => format!("{} - {}", title, artist),
            (Some(title), None) => title.clone(),
            _ => file_name(&self.path).to_string(),
        }
    }

    fn matches(&self, terms: &[String]) -> bool {
        terms.iter().all(|term| self.search_key.contains(term.as_str()))
    }

    fn descriptor(&self, normalize: bool) -> TrackDescriptor {
        let mut track =
            TrackDescriptor::local(self.display_title(), self.path.to_string_lossy().into_owned());
        if let Some(duration) = self.duration {
            track = track.with_duration(duration);
        }
        if normalize {
            if let Some(db) = self.replay_gain_db {
                track = track.with_normalization_gain(db_to_linear(db));
            }
        }
        track
    }
}

/// Resolver over the local library plus direct stream URLs
pub struct LibraryResolver {
    config: LibraryConfig,
    entries: RwLock<Arc<Vec<LibraryEntry>>>,
}

impl LibraryResolver {
    pub fn new(config: LibraryConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// Rebuild the library index; returns the number of files indexed
    ///
    /// The walk and tag reads run on the blocking pool.
    pub async fn scan(&self) -> Result<usize, JukeboxError> {
        let Some(root) = self.config.root.clone() else {
            debug!("No music location configured, skipping library scan");
            return Ok(0);
        };

        if !root.is_dir() {
            warn!(path = %root.display(), "Music location is not a directory");
            return Err(JukeboxError::not_found("Music location", root.display().to_string()));
        }

        info!(path = %root.display(), "Scanning music library");
        let extensions = self.config.extensions.clone();
        let entries = tokio::task::spawn_blocking(move || scan_library(&root, &extensions))
            .await
            .map_err(|e| JukeboxError::Io(std::io::Error::other(e)))?;

        let count = entries.len();
        *self.entries.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(entries);
        info!(tracks = count, "Music library scan complete");
        Ok(count)
    }

    /// Number of indexed local files
    pub fn library_size(&self) -> usize {
        self.index().len()
    }

    fn index(&self) -> Arc<Vec<LibraryEntry>> {
        Arc::clone(&self.entries.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Local tracks whose name or tags contain every query term
    pub fn search_local(&self, query: &str) -> Vec<TrackDescriptor> {
        let terms: Vec<String> = query
            .split_whitespace()
            .map(normalize_term)
            .filter(|term| !term.is_empty())
            .collect();
        if terms.is_empty() {
            return Vec::new();
        }

        self.index()
            .iter()
            .filter(|entry| entry.matches(&terms))
            .map(|entry| entry.descriptor(self.config.normalize))
            .collect()
    }
}

#[async_trait]
impl Resolver for LibraryResolver {
    async fn resolve(&self, query: &str) -> Result<Vec<TrackDescriptor>, ResolveError> {
        let query = query.trim();

        if let Some(url) = stream_url(query) {
            return Ok(vec![TrackDescriptor::remote(url.clone(), url)]);
        }

        let hits = self.search_local(query);
        if hits.is_empty() {
            return Err(ResolveError::NotFound(query.to_string()));
        }
        debug!(query, hits = hits.len(), "Local search");
        Ok(hits)
    }
}

fn scan_library(root: &Path, extensions: &[String]) -> Vec<LibraryEntry> {
    let mut entries: Vec<LibraryEntry> = walkdir::WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_supported(e.path(), extensions))
        .map(|e| LibraryEntry::read(e.path()))
        .collect();
    entries.sort_by(|a, b| a.path.cmp(&b.path));
    entries
}

fn is_supported(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| extensions.iter().any(|ext| ext.eq_ignore_ascii_case(e)))
}

fn file_name(path: &Path) -> &str {
    path.file_name().and_then(|n| n.to_str()).unwrap_or_default()
}

/// Lowercase ASCII alphanumerics only
fn normalize_term(text: &str) -> String {
    text.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Parse a ReplayGain value such as "-3.45 dB"
fn parse_replaygain(value: &str) -> Option<f32> {
    let value = value.trim().to_lowercase();
    let value = value.trim_end_matches("db").trim();
    value.parse().ok()
}

fn db_to_linear(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

/// Canonical form of a direct stream URL, or `None` for a search query
///
/// YouTube share links collapse to the watch URL so the same video is only
/// queued once.
fn stream_url(query: &str) -> Option<String> {
    if !(query.starts_with("http://") || query.starts_with("https://")) {
        return None;
    }

    let video_id = if let Some((_, rest)) = query.split_once("youtu.be/") {
        Some(rest)
    } else if query.contains("youtube.com/") {
        query
            .split_once("v=")
            .or_else(|| query.split_once("/shorts/"))
            .map(|(_, rest)| rest)
    } else {
        None
    };

    let canonical = video_id
        .map(|rest| rest.split(['&', '?', '/', '#']).next().unwrap_or_default())
        .filter(|id| id.len() == 11)
        .map(|id| format!("https://www.youtube.com/watch?v={}", id));

    Some(canonical.unwrap_or_else(|| query.to_string()))
}
