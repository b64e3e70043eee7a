/// ID types for chat-platform entities
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Voice channel identifier (one listening session per channel)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(u64);

impl ChannelId {
    /// Create a new channel ID
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw platform snowflake
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ChannelId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

/// Chat user identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(u64);

impl UserId {
    /// Create a new user ID
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw platform snowflake
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Accept chat mentions like <@1234> as well as bare ids
        let trimmed = s
            .trim()
            .trim_start_matches("<@")
            .trim_start_matches('!')
            .trim_end_matches('>');
        trimmed.parse().map(Self)
    }
}

/// Monotonic tag identifying one `start_playback` call within a session.
///
/// Transport notifications carry the generation they were started with; a
/// controller ignores any notification whose generation is not current.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Generation(u64);

impl Generation {
    /// Create a generation from a raw counter value
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// The generation following this one
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    /// Raw counter value
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_parses_mentions() {
        assert_eq!("<@42>".parse::<UserId>().unwrap(), UserId::new(42));
        assert_eq!("<@!42>".parse::<UserId>().unwrap(), UserId::new(42));
        assert_eq!(" 42 ".parse::<UserId>().unwrap(), UserId::new(42));
        assert!("bob".parse::<UserId>().is_err());
    }

    #[test]
    fn generation_increments() {
        let g = Generation::default();
        assert_eq!(g.next().get(), 1);
        assert_ne!(g, g.next());
    }

    #[test]
    fn ids_serialize_transparently() {
        let json = serde_json::to_string(&ChannelId::new(7)).unwrap();
        assert_eq!(json, "7");
    }
}
