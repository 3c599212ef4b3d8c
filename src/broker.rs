use crate::dispatch::{dispatch, DispatchReport};
use crate::events::{BrokerEvent, BrokerEventBroadcaster, BrokerEventReceiver};
use crate::now_playing::{NowPlayingEntry, NowPlayingTable};
use crate::{
    AgentRegistry, BrokerConfig, NowPlayingInfo, Operation, RequestContext, Result, Scrobble,
    Submission, Track, TrackStore, User,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Coordinates now-playing tracking and scrobble fan-out across every
/// registered agent.
///
/// A broker owns its own [`NowPlayingTable`], so two brokers over the same
/// store see independent now-playing state. Outer wiring should hand out a
/// single instance per store, e.g. through [`crate::shared::get_broker`].
///
/// # Examples
///
/// ```rust,no_run
/// use scrobble_broker::{AgentRegistry, MemoryTrackStore, RequestContext, ScrobbleBroker, TrackStore, User};
/// use std::sync::Arc;
///
/// # async fn example() -> scrobble_broker::Result<()> {
/// let store: Arc<dyn TrackStore> = Arc::new(MemoryTrackStore::from_json_file("library.json")?);
/// let registry = Arc::new(AgentRegistry::new());
/// scrobble_broker::agents::console::register(&registry);
///
/// let broker = ScrobbleBroker::new(store, registry);
/// let ctx = RequestContext::new().with_user(User::new("u-1", "alice"));
///
/// broker.now_playing(&ctx, "player-1", "Living Room", "123").await?;
/// broker.submit(&ctx, "123", chrono::Utc::now()).await?;
/// # Ok(())
/// # }
/// ```
pub struct ScrobbleBroker {
    registry: Arc<AgentRegistry>,
    store: Arc<dyn TrackStore>,
    now_playing: NowPlayingTable,
    config: BrokerConfig,
    events: BrokerEventBroadcaster,
}

impl ScrobbleBroker {
    /// Create a broker with the default [`BrokerConfig`].
    pub fn new(store: Arc<dyn TrackStore>, registry: Arc<AgentRegistry>) -> Self {
        Self::with_config(store, registry, BrokerConfig::default())
    }

    pub fn with_config(
        store: Arc<dyn TrackStore>,
        registry: Arc<AgentRegistry>,
        config: BrokerConfig,
    ) -> Self {
        Self {
            now_playing: NowPlayingTable::with_ttl(config.now_playing_ttl()),
            events: BrokerEventBroadcaster::new(config.event_capacity),
            registry,
            store,
            config,
        }
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn TrackStore> {
        &self.store
    }

    /// Subscribe to dispatch events
    pub fn subscribe(&self) -> BrokerEventReceiver {
        self.events.subscribe()
    }

    /// Get the latest dispatch event
    pub fn latest_event(&self) -> Option<BrokerEvent> {
        self.events.latest_event()
    }

    /// Record that `player_id` started playing `track_id` and notify every agent.
    ///
    /// The now-playing table is updated before agents are contacted and stays
    /// updated whatever they report.
    pub async fn now_playing(
        &self,
        ctx: &RequestContext,
        player_id: &str,
        player_name: &str,
        track_id: &str,
    ) -> Result<()> {
        let user = ctx.require_user()?;
        let track = self.store.get_track(ctx, track_id).await?;

        log::debug!(
            "Now playing on {} ({}) for user {}: {} - {}",
            player_id,
            player_name,
            user.id,
            track.artist,
            track.title
        );

        let entry = NowPlayingEntry::new(
            player_id,
            player_name,
            user.id.clone(),
            user.username.clone(),
            track.clone(),
        );
        self.now_playing.set(entry);
        self.events.broadcast_event(BrokerEvent::NowPlayingRecorded {
            timestamp: Utc::now(),
            player_id: player_id.to_string(),
            username: user.username.clone(),
            track_id: track.id.clone(),
        });

        let report = self.dispatch_now_playing(user, track).await;
        report.into_result(self.config.policy)
    }

    /// Everything currently playing across all players, most recent first.
    ///
    /// Not scoped to the caller; no authenticated user is required.
    pub async fn get_now_playing(&self, _ctx: &RequestContext) -> Result<Vec<NowPlayingInfo>> {
        Ok(self
            .now_playing
            .list()
            .iter()
            .map(NowPlayingEntry::to_info)
            .collect())
    }

    /// Record a completed play of `track_id` and forward it to every agent.
    pub async fn submit(
        &self,
        ctx: &RequestContext,
        track_id: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        self.submit_batch(ctx, &[Submission::new(track_id, timestamp)])
            .await
    }

    /// Forward several completed plays in one call per agent.
    ///
    /// Every track is resolved before anything is dispatched, so one unknown id
    /// fails the whole batch. Scrobbles reach the agents in the given order.
    pub async fn submit_batch(
        &self,
        ctx: &RequestContext,
        submissions: &[Submission],
    ) -> Result<()> {
        let user = ctx.require_user()?;

        let mut scrobbles = Vec::with_capacity(submissions.len());
        for submission in submissions {
            let track = self.store.get_track(ctx, &submission.track_id).await?;
            scrobbles.push(Scrobble::new(track, submission.timestamp));
        }

        if scrobbles.is_empty() {
            log::debug!("Empty submission for user {}, nothing to dispatch", user.id);
            return Ok(());
        }

        log::debug!("Submitting {} scrobbles for user {}", scrobbles.len(), user.id);

        let report = self.dispatch_scrobbles(user, scrobbles).await;
        report.into_result(self.config.policy)
    }

    async fn dispatch_now_playing(&self, user: &User, track: Track) -> DispatchReport {
        let agents = self.registry.enabled_agents(&self.store);
        let user_id = user.id.clone();
        let track = Arc::new(track);

        dispatch(
            agents,
            Operation::NowPlaying,
            &user.id,
            &self.config,
            &self.events,
            move |agent| {
                let user_id = user_id.clone();
                let track = Arc::clone(&track);
                async move { agent.now_playing(&user_id, &track).await }
            },
        )
        .await
    }

    async fn dispatch_scrobbles(&self, user: &User, scrobbles: Vec<Scrobble>) -> DispatchReport {
        let agents = self.registry.enabled_agents(&self.store);
        let user_id = user.id.clone();
        let scrobbles: Arc<[Scrobble]> = scrobbles.into();

        dispatch(
            agents,
            Operation::Scrobble,
            &user.id,
            &self.config,
            &self.events,
            move |agent| {
                let user_id = user_id.clone();
                let scrobbles = Arc::clone(&scrobbles);
                async move { agent.scrobble(&user_id, &scrobbles).await }
            },
        )
        .await
    }
}

impl std::fmt::Debug for ScrobbleBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScrobbleBroker")
            .field("registry", &self.registry)
            .field("now_playing", &self.now_playing.len())
            .field("config", &self.config)
            .finish()
    }
}
