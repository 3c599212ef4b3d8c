//! # scrobble-broker
//!
//! Sits between a playback engine and any number of listening-history
//! services ("agents"). The broker keeps track of what every player is
//! currently playing and fans now-playing reports and completed plays out to
//! every registered agent concurrently, so one slow or failing service never
//! holds up the others.
//!
//! ```rust
//! use scrobble_broker::{
//!     AgentRegistry, MemoryTrackStore, RequestContext, ScrobbleBroker, Track, TrackStore, User,
//! };
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let store = Arc::new(MemoryTrackStore::new());
//! store
//!     .put(Track {
//!         id: "123".to_string(),
//!         title: "Track Title".to_string(),
//!         album: "Track Album".to_string(),
//!         artist: "Track Artist".to_string(),
//!         album_artist: "Track AlbumArtist".to_string(),
//!         track_number: 1,
//!         duration: 180,
//!         mbz_track_id: None,
//!     })
//!     .await;
//!
//! let registry = Arc::new(AgentRegistry::new());
//! scrobble_broker::agents::console::register(&registry);
//!
//! let store: Arc<dyn TrackStore> = store;
//! let broker = ScrobbleBroker::new(store, registry);
//! let ctx = RequestContext::new().with_user(User::new("u-1", "user-1"));
//!
//! broker.now_playing(&ctx, "player-1", "player-one", "123").await?;
//! let playing = broker.get_now_playing(&ctx).await?;
//! assert_eq!(playing[0].track_id, "123");
//! # Ok::<(), scrobble_broker::BrokerError>(())
//! # }).unwrap();
//! ```

pub mod agent;
pub mod agents;
pub mod broker;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod now_playing;
pub mod registry;
pub mod retry;
pub mod shared;
pub mod store;
pub mod types;

pub use agent::{Agent, AgentResult};
pub use broker::ScrobbleBroker;
pub use config::{BrokerConfig, DispatchPolicy, RetryConfig};
pub use context::RequestContext;
pub use dispatch::{AgentOutcome, AgentStatus, DispatchReport};
pub use error::{AgentError, AgentFailure, BrokerError, StoreError};
pub use events::{BrokerEvent, BrokerEventBroadcaster, BrokerEventReceiver};
pub use now_playing::{NowPlayingEntry, NowPlayingTable};
pub use registry::{AgentFactory, AgentRegistry, RegisteredAgent};
pub use store::{MemoryTrackStore, TrackStore};
pub use types::{NowPlayingInfo, Operation, Scrobble, Submission, Track, User};

#[cfg(feature = "mock")]
pub use agent::MockAgent;
#[cfg(feature = "mock")]
pub use store::MockTrackStore;

pub type Result<T> = std::result::Result<T, BrokerError>;
