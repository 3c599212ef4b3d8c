use crate::error::AgentError;
use crate::{Scrobble, Track};
use async_trait::async_trait;

/// Result type returned by [`Agent`] operations.
pub type AgentResult<T> = std::result::Result<T, AgentError>;

/// Capability every pluggable listening-history service implements.
///
/// Agents are instantiated by the [`AgentRegistry`](crate::AgentRegistry) for
/// each dispatch and run concurrently with each other, so implementations must
/// not rely on call ordering across agents. Every failure, network or
/// otherwise, must come back as an [`AgentError`]; the broker additionally
/// bounds each call with its own timeout and catches panics.
///
/// # Mocking Support
///
/// When the `mock` feature is enabled, this crate provides `MockAgent`
/// that implements this trait using the `mockall` library.
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait Agent: Send + Sync {
    /// Tell the service that `user_id` started playing `track`.
    async fn now_playing(&self, user_id: &str, track: &Track) -> AgentResult<()>;

    /// Submit one or more completed plays for `user_id`.
    ///
    /// Scrobbles arrive in the caller's order (oldest first by convention) and
    /// must not be reordered.
    async fn scrobble(&self, user_id: &str, scrobbles: &[Scrobble]) -> AgentResult<()>;

    /// Whether the user has linked this service.
    ///
    /// Unauthorized agents are skipped for that user without counting as a
    /// failure.
    async fn is_authorized(&self, _user_id: &str) -> bool {
        true
    }
}
