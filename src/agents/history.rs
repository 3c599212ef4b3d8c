use crate::agent::AgentResult;
use crate::error::AgentError;
use crate::{Agent, AgentRegistry, Scrobble, Track};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

pub const NAME: &str = "history";

/// One line of the history file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub user_id: String,
    pub track_id: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub listened_at: DateTime<Utc>,
}

impl HistoryRecord {
    fn new(user_id: &str, scrobble: &Scrobble) -> Self {
        Self {
            user_id: user_id.to_string(),
            track_id: scrobble.track.id.clone(),
            title: scrobble.track.title.clone(),
            artist: scrobble.track.artist.clone(),
            album: scrobble.track.album.clone(),
            listened_at: scrobble.timestamp,
        }
    }
}

/// Appends scrobbles to a local JSON-lines listening history.
///
/// Now-playing reports are not persisted.
#[derive(Debug, Clone)]
pub struct HistoryAgent {
    path: PathBuf,
    // Shared by every instance built from the same factory so concurrent
    // dispatches append whole lines.
    write_lock: Arc<Mutex<()>>,
}

impl HistoryAgent {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Agent for HistoryAgent {
    async fn now_playing(&self, user_id: &str, track: &Track) -> AgentResult<()> {
        log::debug!("History: {} is playing {}", user_id, track.id);
        Ok(())
    }

    async fn scrobble(&self, user_id: &str, scrobbles: &[Scrobble]) -> AgentResult<()> {
        let mut lines = String::new();
        for scrobble in scrobbles {
            let line = serde_json::to_string(&HistoryRecord::new(user_id, scrobble))
                .map_err(|e| AgentError::Request(format!("Failed to encode scrobble: {e}")))?;
            lines.push_str(&line);
            lines.push('\n');
        }

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(lines.as_bytes()).await?;
        file.flush().await?;

        log::debug!(
            "History: appended {} scrobbles to {}",
            scrobbles.len(),
            self.path.display()
        );
        Ok(())
    }
}

/// Register a history agent writing to `path`.
pub fn register(registry: &AgentRegistry, path: impl Into<PathBuf>) {
    let agent = HistoryAgent::new(path);
    registry.register(NAME, move |_| Arc::new(agent.clone()));
}

/// Read back every record of a history file, oldest first.
pub fn read_history(path: impl AsRef<Path>) -> crate::Result<Vec<HistoryRecord>> {
    let content = std::fs::read_to_string(path)?;
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(Into::into))
        .collect()
}
