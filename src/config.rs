use crate::{BrokerError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How per-agent outcomes combine into the result of a broker call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchPolicy {
    /// Succeed if at least one agent accepted the call (or none were attempted).
    #[default]
    AnySuccess,
    /// Fail if any attempted agent failed.
    RequireAll,
}

/// Configuration for retrying rate-limited agents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (set to 0 to disable retries)
    pub max_retries: u32,
    /// Base delay for exponential backoff (in seconds)
    pub base_delay: u64,
    /// Maximum delay cap (in seconds)
    pub max_delay: u64,
    /// Whether retries are enabled at all
    pub enabled: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: 1,
            max_delay: 5,
            enabled: true,
        }
    }
}

impl RetryConfig {
    /// Create a config with retries disabled
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            enabled: false,
            ..Default::default()
        }
    }

    /// Create a config with custom retry count
    pub fn with_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            enabled: max_retries > 0,
            ..Default::default()
        }
    }

    /// Create a config with custom delays
    pub fn with_delays(base_delay: u64, max_delay: u64) -> Self {
        Self {
            base_delay,
            max_delay,
            ..Default::default()
        }
    }
}

/// Broker settings, loadable from a JSON file.
///
/// ```rust
/// use scrobble_broker::{BrokerConfig, DispatchPolicy};
/// use std::time::Duration;
///
/// let config = BrokerConfig::new()
///     .with_agent_timeout(Duration::from_secs(3))
///     .with_policy(DispatchPolicy::RequireAll);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Upper bound for a single agent dispatch, retries included (in milliseconds)
    pub agent_timeout_ms: u64,
    /// Retry behavior for rate-limited agents
    pub retry: RetryConfig,
    /// Aggregation policy for agent outcomes
    pub policy: DispatchPolicy,
    /// Expire now-playing entries older than this (in seconds); never when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub now_playing_ttl_secs: Option<u64>,
    /// Capacity of the broker event channel
    pub event_capacity: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            agent_timeout_ms: 10_000,
            retry: RetryConfig::default(),
            policy: DispatchPolicy::default(),
            now_playing_ttl_secs: None,
            event_capacity: 100,
        }
    }
}

impl BrokerConfig {
    /// Create a new config with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Default location: `<config dir>/scrobble-broker/config.json`.
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| BrokerError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("scrobble-broker").join("config.json"))
    }

    /// Load and validate a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config: BrokerConfig = serde_json::from_str(&content)?;
        config.validate()?;

        log::debug!("Broker config loaded from: {}", path.display());
        Ok(config)
    }

    /// Load the config at [`default_path`](Self::default_path), falling back to
    /// defaults when no file exists.
    pub fn load_or_default() -> Result<Self> {
        let path = Self::default_path()?;
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Write the config as pretty JSON, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;

        log::debug!("Broker config saved to: {}", path.display());
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.agent_timeout_ms == 0 {
            return Err(BrokerError::Config(
                "agent_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(BrokerError::Config(
                "event_capacity must be greater than 0".to_string(),
            ));
        }
        if self.retry.max_delay < self.retry.base_delay {
            return Err(BrokerError::Config(
                "retry.max_delay must not be smaller than retry.base_delay".to_string(),
            ));
        }
        if let Some(ttl) = self.now_playing_ttl() {
            let representable = chrono::Duration::from_std(ttl)
                .ok()
                .and_then(|ttl| chrono::Utc::now().checked_add_signed(ttl))
                .is_some();
            if !representable {
                return Err(BrokerError::Config(format!(
                    "now_playing_ttl_secs {} is out of range",
                    ttl.as_secs()
                )));
            }
        }
        Ok(())
    }

    pub fn agent_timeout(&self) -> Duration {
        Duration::from_millis(self.agent_timeout_ms)
    }

    pub fn now_playing_ttl(&self) -> Option<Duration> {
        self.now_playing_ttl_secs.map(Duration::from_secs)
    }

    /// Set the per-agent timeout (millisecond precision, at least 1ms)
    pub fn with_agent_timeout(mut self, timeout: Duration) -> Self {
        self.agent_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX).max(1);
        self
    }

    /// Set custom retry configuration
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Create config with retries disabled
    pub fn with_retries_disabled(self) -> Self {
        self.with_retry_config(RetryConfig::disabled())
    }

    pub fn with_policy(mut self, policy: DispatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_now_playing_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.now_playing_ttl_secs = ttl.map(|d| d.as_secs());
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }
}
