//! # Broker Events
//!
//! Broadcast channel carrying per-agent dispatch outcomes. Per-agent failures
//! never fail a broker call on their own; this channel, together with the log
//! output, is where they surface.

use crate::Operation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};

/// Events emitted by the broker while recording and dispatching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BrokerEvent {
    /// A now-playing entry was written to the table.
    NowPlayingRecorded {
        timestamp: DateTime<Utc>,
        player_id: String,
        username: String,
        track_id: String,
    },
    /// The agent is not linked for this user and was not called.
    AgentSkipped {
        timestamp: DateTime<Utc>,
        agent: String,
        operation: Operation,
        user_id: String,
    },
    /// The agent accepted the call.
    AgentDelivered {
        timestamp: DateTime<Utc>,
        agent: String,
        operation: Operation,
        /// Duration of the dispatch in milliseconds
        duration_ms: u64,
        /// Number of rate-limit retries before success
        retries: u32,
    },
    /// The agent failed, timed out or panicked.
    AgentFailed {
        timestamp: DateTime<Utc>,
        agent: String,
        operation: Operation,
        error_message: String,
        /// Duration of the dispatch in milliseconds
        duration_ms: u64,
    },
    /// The agent was rate limited and will be retried after `delay_seconds`.
    AgentRateLimited {
        timestamp: DateTime<Utc>,
        agent: String,
        operation: Operation,
        delay_seconds: u64,
        /// The retry attempt number about to start (1-based)
        attempt: u32,
    },
    /// Every agent of a dispatch has reported.
    DispatchCompleted {
        timestamp: DateTime<Utc>,
        operation: Operation,
        delivered: usize,
        skipped: usize,
        failed: usize,
    },
}

/// Type alias for the broadcast receiver
pub type BrokerEventReceiver = broadcast::Receiver<BrokerEvent>;

/// Type alias for the watch receiver
pub type BrokerEventWatcher = watch::Receiver<Option<BrokerEvent>>;

/// Cloneable handle that fans events out to every subscriber and remembers the
/// latest one.
#[derive(Clone)]
pub struct BrokerEventBroadcaster {
    event_tx: broadcast::Sender<BrokerEvent>,
    last_event_tx: watch::Sender<Option<BrokerEvent>>,
}

impl BrokerEventBroadcaster {
    /// Create a broadcaster buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (event_tx, _) = broadcast::channel(capacity.max(1));
        let (last_event_tx, _) = watch::channel(None);

        Self {
            event_tx,
            last_event_tx,
        }
    }

    /// Broadcast an event to all subscribers
    pub fn broadcast_event(&self, event: BrokerEvent) {
        // Sends fail only when nobody is subscribed.
        let _ = self.event_tx.send(event.clone());
        self.last_event_tx.send_replace(Some(event));
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> BrokerEventReceiver {
        self.event_tx.subscribe()
    }

    /// Watch the most recent event
    pub fn watch(&self) -> BrokerEventWatcher {
        self.last_event_tx.subscribe()
    }

    /// Get the latest event
    pub fn latest_event(&self) -> Option<BrokerEvent> {
        self.last_event_tx.borrow().clone()
    }
}

impl Default for BrokerEventBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}

impl std::fmt::Debug for BrokerEventBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerEventBroadcaster")
            .field("subscribers", &self.event_tx.receiver_count())
            .finish()
    }
}
