use crate::error::StoreError;
use crate::{RequestContext, Result, Track};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tokio::sync::RwLock;

/// Read-only catalog lookup consumed by the broker and handed to agent factories.
///
/// # Mocking Support
///
/// When the `mock` feature is enabled, this crate provides `MockTrackStore`
/// that implements this trait using the `mockall` library.
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait TrackStore: Send + Sync {
    /// Resolve a track id to its current metadata snapshot.
    async fn get_track(
        &self,
        ctx: &RequestContext,
        track_id: &str,
    ) -> std::result::Result<Track, StoreError>;
}

/// In-memory [`TrackStore`], used by the CLI and by tests.
#[derive(Debug, Default)]
pub struct MemoryTrackStore {
    tracks: RwLock<HashMap<String, Track>>,
}

impl MemoryTrackStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a list of tracks. Later duplicates win.
    pub fn with_tracks(tracks: impl IntoIterator<Item = Track>) -> Self {
        let tracks = tracks.into_iter().map(|t| (t.id.clone(), t)).collect();
        Self {
            tracks: RwLock::new(tracks),
        }
    }

    /// Load a catalog snapshot from a JSON file holding an array of tracks.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let tracks: Vec<Track> = serde_json::from_str(&content)?;
        log::debug!("Loaded {} tracks from {}", tracks.len(), path.display());
        Ok(Self::with_tracks(tracks))
    }

    /// Insert or replace a track.
    pub async fn put(&self, track: Track) {
        self.tracks.write().await.insert(track.id.clone(), track);
    }

    pub async fn len(&self) -> usize {
        self.tracks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tracks.read().await.is_empty()
    }
}

#[async_trait]
impl TrackStore for MemoryTrackStore {
    async fn get_track(
        &self,
        _ctx: &RequestContext,
        track_id: &str,
    ) -> std::result::Result<Track, StoreError> {
        self.tracks
            .read()
            .await
            .get(track_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(track_id.to_string()))
    }
}
