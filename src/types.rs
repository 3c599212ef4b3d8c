//! Data types shared by the broker, its agents and its callers.
//!
//! This module contains the track snapshot handed to agents, the scrobble
//! records built on submission, the acting user and the externally visible
//! now-playing projection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ================================================================================================
// TRACK METADATA
// ================================================================================================

/// A track as resolved from the catalog at the moment of a broker call.
///
/// The broker never caches tracks beyond a single call; every agent receives
/// the same immutable snapshot.
///
/// # Examples
///
/// ```rust
/// use scrobble_broker::Track;
///
/// let track = Track {
///     id: "123".to_string(),
///     title: "Paranoid Android".to_string(),
///     album: "OK Computer".to_string(),
///     artist: "Radiohead".to_string(),
///     album_artist: "Radiohead".to_string(),
///     track_number: 2,
///     duration: 387,
///     mbz_track_id: None,
/// };
///
/// println!("{} by {} ({}s)", track.title, track.artist, track.duration);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Track {
    /// Opaque catalog identifier
    pub id: String,
    /// The track name/title
    pub title: String,
    /// The album name
    #[serde(default)]
    pub album: String,
    /// The track artist
    pub artist: String,
    /// The album artist, often identical to the track artist
    #[serde(default)]
    pub album_artist: String,
    /// Position on the album (1-indexed, 0 when unknown)
    #[serde(default)]
    pub track_number: u32,
    /// Duration in seconds
    #[serde(default)]
    pub duration: u32,
    /// MusicBrainz recording id, when the catalog knows it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mbz_track_id: Option<String>,
}

/// A completed play, handed to every agent by value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scrobble {
    /// The track that was played
    pub track: Track,
    /// When the play was registered as complete
    pub timestamp: DateTime<Utc>,
}

impl Scrobble {
    pub fn new(track: Track, timestamp: DateTime<Utc>) -> Self {
        Self { track, timestamp }
    }

    /// Track id of the scrobbled track.
    pub fn id(&self) -> &str {
        &self.track.id
    }
}

/// One entry of a batched submission: a track id and when its play completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub track_id: String,
    pub timestamp: DateTime<Utc>,
}

impl Submission {
    pub fn new(track_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            track_id: track_id.into(),
            timestamp,
        }
    }
}

// ================================================================================================
// USERS AND NOW PLAYING
// ================================================================================================

/// The authenticated user a broker call acts on behalf of.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
}

impl User {
    pub fn new(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
        }
    }
}

/// Externally visible shape of a now-playing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NowPlayingInfo {
    pub player_id: String,
    pub player_name: String,
    pub user_id: String,
    pub username: String,
    pub track_id: String,
    /// Full track snapshot recorded with the entry
    pub track: Track,
    /// When the entry was recorded
    pub started_at: DateTime<Utc>,
}

// ================================================================================================
// OPERATIONS
// ================================================================================================

/// The kind of call being fanned out to agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    NowPlaying,
    Scrobble,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NowPlaying => write!(f, "now playing"),
            Self::Scrobble => write!(f, "scrobble"),
        }
    }
}
