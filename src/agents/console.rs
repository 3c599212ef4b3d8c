use crate::agent::AgentResult;
use crate::{Agent, AgentRegistry, Scrobble, Track};
use async_trait::async_trait;
use std::sync::Arc;

pub const NAME: &str = "console";

/// Writes every now-playing report and scrobble to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleAgent;

#[async_trait]
impl Agent for ConsoleAgent {
    async fn now_playing(&self, user_id: &str, track: &Track) -> AgentResult<()> {
        log::info!(
            "[{}] Now playing: {} - {} ({})",
            user_id,
            track.artist,
            track.title,
            track.album
        );
        Ok(())
    }

    async fn scrobble(&self, user_id: &str, scrobbles: &[Scrobble]) -> AgentResult<()> {
        for scrobble in scrobbles {
            log::info!(
                "[{}] Scrobbled: {} - {} at {}",
                user_id,
                scrobble.track.artist,
                scrobble.track.title,
                scrobble.timestamp.to_rfc3339()
            );
        }
        Ok(())
    }
}

pub fn register(registry: &AgentRegistry) {
    registry.register(NAME, |_| Arc::new(ConsoleAgent));
}
