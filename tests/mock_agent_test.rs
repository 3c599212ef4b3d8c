#[cfg(feature = "mock")]
mod mock_tests {
    use chrono::Utc;
    use scrobble_broker::{
        Agent, AgentError, AgentRegistry, BrokerError, MockAgent, MockTrackStore, RequestContext,
        Result, ScrobbleBroker, StoreError, Track, TrackStore, User,
    };
    use std::sync::Arc;

    fn track() -> Track {
        Track {
            id: "123".to_string(),
            title: "Track Title".to_string(),
            album: "Track Album".to_string(),
            artist: "Track Artist".to_string(),
            album_artist: "Track AlbumArtist".to_string(),
            track_number: 1,
            duration: 180,
            mbz_track_id: Some("mbz-123".to_string()),
        }
    }

    fn mock_store() -> Arc<dyn TrackStore> {
        let mut store = MockTrackStore::new();
        store.expect_get_track().returning(|_, id| {
            if id == "123" {
                Ok(track())
            } else {
                Err(StoreError::NotFound(id.to_string()))
            }
        });
        Arc::new(store)
    }

    fn broker_with(agent: MockAgent) -> ScrobbleBroker {
        let registry = Arc::new(AgentRegistry::new());
        let agent: Arc<dyn Agent> = Arc::new(agent);
        registry.register("mock", move |_| agent.clone());
        ScrobbleBroker::new(mock_store(), registry)
    }

    fn ctx() -> RequestContext {
        RequestContext::new().with_user(User::new("u-1", "user-1"))
    }

    #[tokio::test]
    async fn test_mock_now_playing() -> Result<()> {
        let mut agent = MockAgent::new();

        // Set up expectations
        agent.expect_is_authorized().returning(|_| true);
        agent
            .expect_now_playing()
            .withf(|user_id, track| user_id == "u-1" && track.id == "123")
            .times(1)
            .returning(|_, _| Ok(()));
        agent.expect_scrobble().never();

        let broker = broker_with(agent);
        broker
            .now_playing(&ctx(), "player-1", "player-one", "123")
            .await?;

        Ok(())
    }

    #[tokio::test]
    async fn test_mock_scrobble() -> Result<()> {
        let mut agent = MockAgent::new();
        let ts = Utc::now();

        agent
            .expect_is_authorized()
            .withf(|user_id| user_id == "u-1")
            .returning(|_| true);
        agent
            .expect_scrobble()
            .withf(move |user_id, scrobbles| {
                user_id == "u-1"
                    && scrobbles.len() == 1
                    && scrobbles[0].id() == "123"
                    && scrobbles[0].timestamp == ts
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let broker = broker_with(agent);
        broker.submit(&ctx(), "123", ts).await?;

        Ok(())
    }

    #[tokio::test]
    async fn test_mock_agent_failure_is_aggregated() {
        let mut agent = MockAgent::new();
        agent.expect_is_authorized().returning(|_| true);
        agent
            .expect_scrobble()
            .times(1)
            .returning(|_, _| Err(AgentError::Request("HTTP 503".to_string())));

        let broker = broker_with(agent);
        let err = broker.submit(&ctx(), "123", Utc::now()).await.unwrap_err();

        assert!(matches!(err, BrokerError::AllAgentsFailed { .. }));
        assert_eq!(err.agent_failures()[0].agent, "mock");
        assert_eq!(
            err.agent_failures()[0].to_string(),
            "mock: Request failed: HTTP 503"
        );
    }

    #[tokio::test]
    async fn test_mock_unknown_track_never_reaches_agent() {
        let mut agent = MockAgent::new();
        agent.expect_is_authorized().never();
        agent.expect_now_playing().never();

        let broker = broker_with(agent);
        let err = broker
            .now_playing(&ctx(), "player-1", "player-one", "missing")
            .await
            .unwrap_err();

        assert!(matches!(err, BrokerError::TrackNotFound(_)));
    }
}
