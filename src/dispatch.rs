use crate::agent::AgentResult;
use crate::config::{BrokerConfig, DispatchPolicy, RetryConfig};
use crate::error::{AgentError, AgentFailure};
use crate::events::{BrokerEvent, BrokerEventBroadcaster};
use crate::registry::RegisteredAgent;
use crate::retry::retry_with_backoff;
use crate::{Agent, BrokerError, Operation, Result};
use chrono::Utc;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

/// What happened to one agent during a dispatch.
#[derive(Debug)]
pub enum AgentStatus {
    Delivered {
        /// Rate-limit retries needed before the agent accepted the call
        retries: u32,
    },
    /// The user has not linked this agent.
    Skipped,
    Failed(AgentError),
}

#[derive(Debug)]
pub struct AgentOutcome {
    pub agent: String,
    pub status: AgentStatus,
    pub elapsed: Duration,
}

/// Per-agent outcomes of one fan-out, in registration order.
#[derive(Debug)]
pub struct DispatchReport {
    pub operation: Operation,
    pub outcomes: Vec<AgentOutcome>,
}

impl DispatchReport {
    pub fn delivered(&self) -> usize {
        self.count(|s| matches!(s, AgentStatus::Delivered { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, AgentStatus::Skipped))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, AgentStatus::Failed(_)))
    }

    fn count(&self, pred: impl Fn(&AgentStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }

    /// Collapse the report into the broker call's result.
    ///
    /// With no failures the call succeeds, including the vacuous case where no
    /// agent was attempted. Otherwise `AnySuccess` succeeds as long as one agent
    /// delivered, and `RequireAll` always fails.
    pub fn into_result(self, policy: DispatchPolicy) -> Result<()> {
        let operation = self.operation;
        let mut delivered = 0;
        let mut failures = Vec::new();

        for outcome in self.outcomes {
            match outcome.status {
                AgentStatus::Delivered { .. } => delivered += 1,
                AgentStatus::Skipped => {}
                AgentStatus::Failed(error) => failures.push(AgentFailure {
                    agent: outcome.agent,
                    error,
                }),
            }
        }

        if failures.is_empty() {
            return Ok(());
        }

        match policy {
            DispatchPolicy::AnySuccess if delivered > 0 => Ok(()),
            DispatchPolicy::AnySuccess => Err(BrokerError::AllAgentsFailed {
                operation,
                failures,
            }),
            DispatchPolicy::RequireAll => Err(BrokerError::IncompleteDispatch {
                operation,
                delivered,
                failures,
            }),
        }
    }
}

/// Fan `call` out to every agent and wait for all of them.
///
/// Each agent runs in its own task so a slow agent cannot hold up the others.
/// Every task is bounded by the configured agent timeout and a panic is turned
/// into that agent's failure. Dropping the returned future aborts any task
/// still in flight.
///
/// Agents must not block the thread. On a current-thread runtime a blocking
/// call stalls its siblings and the timeout along with them.
pub(crate) async fn dispatch<F, Fut>(
    agents: Vec<RegisteredAgent>,
    operation: Operation,
    user_id: &str,
    config: &BrokerConfig,
    events: &BrokerEventBroadcaster,
    call: F,
) -> DispatchReport
where
    F: Fn(Arc<dyn Agent>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AgentResult<()>> + Send + 'static,
{
    log::debug!("Dispatching {} to {} agents", operation, agents.len());

    let call = Arc::new(call);
    let mut tasks = JoinSet::new();

    for (index, registered) in agents.iter().enumerate() {
        let agent = Arc::clone(&registered.agent);
        let name = registered.name.clone();
        let call = Arc::clone(&call);
        let user_id = user_id.to_string();
        let retry = config.retry.clone();
        let timeout = config.agent_timeout();
        let events = events.clone();

        tasks.spawn(async move {
            let started = Instant::now();
            let run = run_agent(
                agent, &name, operation, &user_id, &*call, &retry, timeout, &events,
            );
            let status = AssertUnwindSafe(run)
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| {
                    AgentStatus::Failed(AgentError::Panicked(panic_message(&*payload)))
                });

            (
                index,
                AgentOutcome {
                    agent: name,
                    status,
                    elapsed: started.elapsed(),
                },
            )
        });
    }

    let mut slots: Vec<Option<AgentOutcome>> = agents.iter().map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, outcome)) => slots[index] = Some(outcome),
            Err(e) => log::warn!("{operation} dispatch task did not complete: {e}"),
        }
    }

    let outcomes: Vec<AgentOutcome> = agents
        .into_iter()
        .zip(slots)
        .map(|(registered, slot)| {
            slot.unwrap_or_else(|| AgentOutcome {
                agent: registered.name,
                status: AgentStatus::Failed(AgentError::Cancelled),
                elapsed: Duration::ZERO,
            })
        })
        .collect();

    let report = DispatchReport {
        operation,
        outcomes,
    };
    publish(&report, user_id, events);
    report
}

#[allow(clippy::too_many_arguments)]
async fn run_agent<F, Fut>(
    agent: Arc<dyn Agent>,
    name: &str,
    operation: Operation,
    user_id: &str,
    call: &F,
    retry: &RetryConfig,
    timeout: Duration,
    events: &BrokerEventBroadcaster,
) -> AgentStatus
where
    F: Fn(Arc<dyn Agent>) -> Fut,
    Fut: Future<Output = AgentResult<()>>,
{
    let attempt = async {
        if !agent.is_authorized(user_id).await {
            return AgentStatus::Skipped;
        }

        let operation_name = format!("{name} {operation}");
        let result = retry_with_backoff(
            retry,
            &operation_name,
            || call(Arc::clone(&agent)),
            |delay_seconds, attempt| {
                events.broadcast_event(BrokerEvent::AgentRateLimited {
                    timestamp: Utc::now(),
                    agent: name.to_string(),
                    operation,
                    delay_seconds,
                    attempt,
                })
            },
        )
        .await;

        match result {
            Ok(retried) => AgentStatus::Delivered {
                retries: retried.attempts_made,
            },
            Err(e) => AgentStatus::Failed(e),
        }
    };

    match tokio::time::timeout(timeout, attempt).await {
        Ok(status) => status,
        Err(_) => AgentStatus::Failed(AgentError::Timeout(timeout)),
    }
}

fn publish(report: &DispatchReport, user_id: &str, events: &BrokerEventBroadcaster) {
    let operation = report.operation;

    for outcome in &report.outcomes {
        let duration_ms = outcome.elapsed.as_millis() as u64;
        let event = match &outcome.status {
            AgentStatus::Delivered { retries } => {
                log::debug!(
                    "Agent '{}' handled {} in {}ms",
                    outcome.agent,
                    operation,
                    duration_ms
                );
                BrokerEvent::AgentDelivered {
                    timestamp: Utc::now(),
                    agent: outcome.agent.clone(),
                    operation,
                    duration_ms,
                    retries: *retries,
                }
            }
            AgentStatus::Skipped => {
                log::debug!(
                    "Agent '{}' is not authorized for user {}, skipped {}",
                    outcome.agent,
                    user_id,
                    operation
                );
                BrokerEvent::AgentSkipped {
                    timestamp: Utc::now(),
                    agent: outcome.agent.clone(),
                    operation,
                    user_id: user_id.to_string(),
                }
            }
            AgentStatus::Failed(error) => {
                log::warn!(
                    "Agent '{}' failed to handle {}: {}",
                    outcome.agent,
                    operation,
                    error
                );
                BrokerEvent::AgentFailed {
                    timestamp: Utc::now(),
                    agent: outcome.agent.clone(),
                    operation,
                    error_message: error.to_string(),
                    duration_ms,
                }
            }
        };
        events.broadcast_event(event);
    }

    events.broadcast_event(BrokerEvent::DispatchCompleted {
        timestamp: Utc::now(),
        operation,
        delivered: report.delivered(),
        skipped: report.skipped(),
        failed: report.failed(),
    });
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Scrobble, Track};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    enum Behavior {
        Succeed,
        Fail,
        Sleep(Duration),
        Panic,
        RateLimitOnce,
        Unauthorized,
    }

    struct TestAgent {
        behavior: Behavior,
        calls: AtomicU32,
    }

    impl TestAgent {
        fn registered(name: &str, behavior: Behavior) -> RegisteredAgent {
            RegisteredAgent {
                name: name.to_string(),
                agent: Arc::new(TestAgent {
                    behavior,
                    calls: AtomicU32::new(0),
                }),
            }
        }
    }

    #[async_trait]
    impl Agent for TestAgent {
        async fn now_playing(&self, _user_id: &str, _track: &Track) -> AgentResult<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behavior {
                Behavior::Succeed | Behavior::Unauthorized => Ok(()),
                Behavior::Fail => Err(AgentError::Request("service unavailable".to_string())),
                Behavior::Sleep(d) => {
                    tokio::time::sleep(*d).await;
                    Ok(())
                }
                Behavior::Panic => panic!("agent exploded"),
                Behavior::RateLimitOnce if call == 0 => {
                    Err(AgentError::RateLimited { retry_after: 0 })
                }
                Behavior::RateLimitOnce => Ok(()),
            }
        }

        async fn scrobble(&self, user_id: &str, _scrobbles: &[Scrobble]) -> AgentResult<()> {
            self.now_playing(user_id, &track()).await
        }

        async fn is_authorized(&self, _user_id: &str) -> bool {
            !matches!(self.behavior, Behavior::Unauthorized)
        }
    }

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

    fn config() -> BrokerConfig {
        BrokerConfig::new()
            .with_agent_timeout(Duration::from_millis(200))
            .with_retry_config(RetryConfig {
                max_retries: 2,
                base_delay: 0,
                max_delay: 0,
                enabled: true,
            })
    }

    async fn run(agents: Vec<RegisteredAgent>) -> DispatchReport {
        let track = Arc::new(track());
        dispatch(
            agents,
            Operation::NowPlaying,
            "u-1",
            &config(),
            &BrokerEventBroadcaster::default(),
            move |agent| {
                let track = Arc::clone(&track);
                async move { agent.now_playing("u-1", &track).await }
            },
        )
        .await
    }

    #[tokio::test]
    async fn test_outcomes_follow_registration_order() {
        let report = run(vec![
            TestAgent::registered("slow", Behavior::Sleep(Duration::from_millis(50))),
            TestAgent::registered("fast", Behavior::Succeed),
            TestAgent::registered("broken", Behavior::Fail),
        ])
        .await;

        let names: Vec<&str> = report.outcomes.iter().map(|o| o.agent.as_str()).collect();
        assert_eq!(names, vec!["slow", "fast", "broken"]);
        assert_eq!(report.delivered(), 2);
        assert_eq!(report.failed(), 1);
    }

    #[tokio::test]
    async fn test_agents_run_concurrently() {
        let started = Instant::now();
        let report = run(vec![
            TestAgent::registered("a", Behavior::Sleep(Duration::from_millis(100))),
            TestAgent::registered("b", Behavior::Sleep(Duration::from_millis(100))),
            TestAgent::registered("c", Behavior::Sleep(Duration::from_millis(100))),
        ])
        .await;

        assert_eq!(report.delivered(), 3);
        assert!(started.elapsed() < Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_timeout_is_isolated() {
        let report = run(vec![
            TestAgent::registered("stuck", Behavior::Sleep(Duration::from_secs(30))),
            TestAgent::registered("ok", Behavior::Succeed),
        ])
        .await;

        assert!(matches!(
            report.outcomes[0].status,
            AgentStatus::Failed(AgentError::Timeout(_))
        ));
        assert!(matches!(
            report.outcomes[1].status,
            AgentStatus::Delivered { .. }
        ));
        assert!(report.into_result(DispatchPolicy::AnySuccess).is_ok());
    }

    #[tokio::test]
    async fn test_panic_is_isolated() {
        let report = run(vec![
            TestAgent::registered("panics", Behavior::Panic),
            TestAgent::registered("ok", Behavior::Succeed),
        ])
        .await;

        match &report.outcomes[0].status {
            AgentStatus::Failed(AgentError::Panicked(msg)) => assert_eq!(msg, "agent exploded"),
            other => panic!("Expected panic failure, got: {other:?}"),
        }
        assert_eq!(report.delivered(), 1);
    }

    #[tokio::test]
    async fn test_rate_limited_agent_is_retried() {
        let report = run(vec![TestAgent::registered("limited", Behavior::RateLimitOnce)]).await;

        assert!(matches!(
            report.outcomes[0].status,
            AgentStatus::Delivered { retries: 1 }
        ));
    }

    #[tokio::test]
    async fn test_unauthorized_agent_is_skipped() {
        let report = run(vec![TestAgent::registered("unlinked", Behavior::Unauthorized)]).await;

        assert_eq!(report.skipped(), 1);
        assert!(report.into_result(DispatchPolicy::RequireAll).is_ok());
    }

    #[tokio::test]
    async fn test_no_agents_is_vacuous_success() {
        let report = run(Vec::new()).await;
        assert!(report.outcomes.is_empty());
        assert!(report.into_result(DispatchPolicy::AnySuccess).is_ok());
    }

    #[tokio::test]
    async fn test_all_failed() {
        let report = run(vec![
            TestAgent::registered("a", Behavior::Fail),
            TestAgent::registered("b", Behavior::Panic),
        ])
        .await;

        match report.into_result(DispatchPolicy::AnySuccess) {
            Err(BrokerError::AllAgentsFailed { operation, failures }) => {
                assert_eq!(operation, Operation::NowPlaying);
                assert_eq!(failures.len(), 2);
                assert_eq!(failures[0].agent, "a");
                assert_eq!(failures[1].agent, "b");
            }
            other => panic!("Expected AllAgentsFailed, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_require_all_policy() {
        let report = run(vec![
            TestAgent::registered("ok", Behavior::Succeed),
            TestAgent::registered("broken", Behavior::Fail),
        ])
        .await;

        match report.into_result(DispatchPolicy::RequireAll) {
            Err(BrokerError::IncompleteDispatch {
                delivered,
                failures,
                ..
            }) => {
                assert_eq!(delivered, 1);
                assert_eq!(failures[0].agent, "broken");
            }
            other => panic!("Expected IncompleteDispatch, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_events_are_published() {
        let events = BrokerEventBroadcaster::default();
        let mut rx = events.subscribe();

        dispatch(
            vec![
                TestAgent::registered("ok", Behavior::Succeed),
                TestAgent::registered("broken", Behavior::Fail),
            ],
            Operation::Scrobble,
            "u-1",
            &config(),
            &events,
            |agent| async move { agent.scrobble("u-1", &[]).await },
        )
        .await;

        assert!(matches!(
            rx.recv().await.unwrap(),
            BrokerEvent::AgentDelivered { ref agent, .. } if agent == "ok"
        ));
        assert!(matches!(
            rx.recv().await.unwrap(),
            BrokerEvent::AgentFailed { ref agent, .. } if agent == "broken"
        ));
        assert!(matches!(
            rx.recv().await.unwrap(),
            BrokerEvent::DispatchCompleted {
                delivered: 1,
                failed: 1,
                ..
            }
        ));
    }
}
