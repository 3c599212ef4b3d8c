#![allow(dead_code)]

use async_trait::async_trait;
use scrobble_broker::{
    Agent, AgentError, AgentRegistry, AgentResult, MemoryTrackStore, Scrobble, ScrobbleBroker,
    Track, TrackStore,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn track(id: &str) -> Track {
    Track {
        id: id.to_string(),
        title: "Track Title".to_string(),
        album: "Track Album".to_string(),
        artist: "Track Artist".to_string(),
        album_artist: "Track AlbumArtist".to_string(),
        track_number: 1,
        duration: 180,
        mbz_track_id: Some(format!("mbz-{id}")),
    }
}

/// Store holding tracks "123" and "456".
pub async fn test_store() -> Arc<dyn TrackStore> {
    let store = MemoryTrackStore::new();
    store.put(track("123")).await;
    store.put(track("456")).await;
    Arc::new(store)
}

#[derive(Clone, Copy)]
enum Behavior {
    Succeed,
    Fail,
    Slow(Duration),
    Unauthorized,
}

#[derive(Default)]
struct Recorded {
    now_playing: Vec<(String, Track)>,
    scrobbles: Vec<(String, Vec<Scrobble>)>,
}

/// Agent that records every call. Clones share their recordings, so the copy
/// kept by a test sees what the registry-built instances received.
#[derive(Clone)]
pub struct FakeAgent {
    behavior: Behavior,
    recorded: Arc<Mutex<Recorded>>,
}

impl FakeAgent {
    fn with_behavior(behavior: Behavior) -> Self {
        Self {
            behavior,
            recorded: Arc::default(),
        }
    }

    pub fn new() -> Self {
        Self::with_behavior(Behavior::Succeed)
    }

    pub fn failing() -> Self {
        Self::with_behavior(Behavior::Fail)
    }

    pub fn slow(delay: Duration) -> Self {
        Self::with_behavior(Behavior::Slow(delay))
    }

    pub fn unauthorized() -> Self {
        Self::with_behavior(Behavior::Unauthorized)
    }

    pub fn now_playing_calls(&self) -> Vec<(String, Track)> {
        self.recorded.lock().unwrap().now_playing.clone()
    }

    pub fn scrobble_calls(&self) -> Vec<(String, Vec<Scrobble>)> {
        self.recorded.lock().unwrap().scrobbles.clone()
    }

    async fn behave(&self) -> AgentResult<()> {
        match self.behavior {
            Behavior::Fail => Err(AgentError::Request("service unavailable".to_string())),
            Behavior::Slow(delay) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
            Behavior::Succeed | Behavior::Unauthorized => Ok(()),
        }
    }
}

#[async_trait]
impl Agent for FakeAgent {
    async fn now_playing(&self, user_id: &str, track: &Track) -> AgentResult<()> {
        self.behave().await?;
        self.recorded
            .lock()
            .unwrap()
            .now_playing
            .push((user_id.to_string(), track.clone()));
        Ok(())
    }

    async fn scrobble(&self, user_id: &str, scrobbles: &[Scrobble]) -> AgentResult<()> {
        self.behave().await?;
        self.recorded
            .lock()
            .unwrap()
            .scrobbles
            .push((user_id.to_string(), scrobbles.to_vec()));
        Ok(())
    }

    async fn is_authorized(&self, _user_id: &str) -> bool {
        !matches!(self.behavior, Behavior::Unauthorized)
    }
}

pub fn register(registry: &AgentRegistry, name: &str, fake: FakeAgent) {
    registry.register(name, move |_| Arc::new(fake.clone()));
}

/// Broker over [`test_store`] with the given agents registered in order.
pub async fn broker_with(agents: Vec<(&str, FakeAgent)>) -> ScrobbleBroker {
    let registry = Arc::new(AgentRegistry::new());
    for (name, fake) in agents {
        register(&registry, name, fake);
    }
    ScrobbleBroker::new(test_store().await, registry)
}
