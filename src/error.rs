use crate::types::Operation;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Error types for broker operations.
///
/// Lookup and authentication failures abort a call before any state is touched.
/// Failures of individual agents never surface here on their own; they only
/// contribute to [`BrokerError::AllAgentsFailed`] (or
/// [`BrokerError::IncompleteDispatch`] under the `require_all` policy).
///
/// # Error Handling Examples
///
/// ```rust,no_run
/// use scrobble_broker::{BrokerError, RequestContext, ScrobbleBroker};
///
/// # async fn example(broker: &ScrobbleBroker, ctx: &RequestContext) {
/// match broker.now_playing(ctx, "player-1", "Living Room", "123").await {
///     Ok(()) => println!("Now playing recorded"),
///     Err(BrokerError::AuthenticationRequired) => eprintln!("Log in first"),
///     Err(BrokerError::TrackNotFound(id)) => eprintln!("Unknown track {id}"),
///     Err(BrokerError::AllAgentsFailed { failures, .. }) => {
///         for failure in failures {
///             eprintln!("{failure}");
///         }
///     }
///     Err(e) => eprintln!("Other error: {e}"),
/// }
/// # }
/// ```
#[derive(Error, Debug)]
pub enum BrokerError {
    /// No user is bound to the request context.
    #[error("Authentication required")]
    AuthenticationRequired,

    /// The referenced track id does not resolve in the store.
    #[error("Track not found: {0}")]
    TrackNotFound(String),

    /// The store failed for a reason other than a missing track.
    #[error("Store error: {0}")]
    Store(String),

    /// Every agent that was attempted for a dispatch failed.
    #[error("All {} agents failed to handle {operation}", failures.len())]
    AllAgentsFailed {
        /// The operation being dispatched
        operation: Operation,
        /// One entry per failed agent
        failures: Vec<AgentFailure>,
    },

    /// Some agents failed while the broker requires every agent to succeed.
    #[error("{} agents failed to handle {operation} ({delivered} delivered)", failures.len())]
    IncompleteDispatch {
        /// The operation being dispatched
        operation: Operation,
        /// Number of agents that accepted the call
        delivered: usize,
        /// One entry per failed agent
        failures: Vec<AgentFailure>,
    },

    /// Invalid broker configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system I/O errors while loading configuration or catalogs.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON in a configuration or catalog file.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BrokerError {
    /// Failures of the individual agents, if this error came from a dispatch.
    pub fn agent_failures(&self) -> &[AgentFailure] {
        match self {
            Self::AllAgentsFailed { failures, .. } | Self::IncompleteDispatch { failures, .. } => {
                failures
            }
            _ => &[],
        }
    }
}

/// Failure reported by (or on behalf of) a single agent.
#[derive(Error, Debug)]
pub enum AgentError {
    /// The remote service rejected the call or could not be reached.
    #[error("Request failed: {0}")]
    Request(String),

    /// The remote service asked the agent to slow down.
    #[error("Rate limited, retry after {retry_after} seconds")]
    RateLimited {
        /// Number of seconds to wait before retrying
        retry_after: u64,
    },

    /// The agent did not finish within the broker's per-agent timeout.
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// The agent panicked while handling the call.
    #[error("Agent panicked: {0}")]
    Panicked(String),

    /// The dispatch task was aborted before it reported a result.
    #[error("Dispatch cancelled")]
    Cancelled,

    /// Local I/O failure inside the agent.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// An [`AgentError`] tagged with the name the agent was registered under.
#[derive(Debug)]
pub struct AgentFailure {
    pub agent: String,
    pub error: AgentError,
}

impl fmt::Display for AgentFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.agent, self.error)
    }
}

/// Errors returned by a [`TrackStore`](crate::TrackStore).
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Track not found: {0}")]
    NotFound(String),

    #[error("Store backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for BrokerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => BrokerError::TrackNotFound(id),
            StoreError::Backend(msg) => BrokerError::Store(msg),
        }
    }
}
