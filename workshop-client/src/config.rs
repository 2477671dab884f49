//! Client configuration
//!
//! All timing knobs of the reconnection protocol live here. The settle
//! delays were tuned against one hosted provider and are defaults, not
//! protocol guarantees.
//!
//! # Environment variables
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | WORKSHOP_TOKEN_TIMEOUT_MS | 10000 | Credential refresh deadline |
//! | WORKSHOP_MIN_TOKEN_LEN | 50 | Shortest token accepted from the provider |
//! | WORKSHOP_DISABLE_SETTLE_MS | 3000 | Wait after disabling the network channel |
//! | WORKSHOP_ENABLE_SETTLE_MS | 1000 | Wait after re-enabling the network channel |
//! | WORKSHOP_RETRY_MAX_ATTEMPTS | 3 | Attempts per retried operation |
//! | WORKSHOP_RETRY_BASE_MS | 1000 | First backoff delay |
//! | WORKSHOP_RETRY_MAX_MS | 10000 | Backoff cap |
//! | WORKSHOP_SENTINEL_DOC | health/sentinel | Document read by the health check |
//! | WORKSHOP_ARTIFACT_MARKERS | firebase,firestore | Local storage keys cleared on escalation |
//! | WORKSHOP_TERMINATE_ON_ESCALATION | false | Terminate the store client during escalation |
//! | WORKSHOP_SIGN_OUT_ON_TERMINAL_AUTH | true | Sign out when the session is gone |

use std::time::Duration;

use crate::provider::DocumentPath;

/// Retry/backoff policy for remote reads and writes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum attempts including the first one
    pub max_attempts: u32,
    /// Delay after the first failed attempt
    pub base_delay: Duration,
    /// Backoff cap
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Set the base and cap of the exponential backoff
    pub fn with_delays(mut self, base_delay: Duration, max_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self.max_delay = max_delay;
        self
    }

    /// Delay between attempt `attempt` and `attempt + 1` (0-based):
    /// `min(base * 2^attempt, max)`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Configuration of the connection resilience layer
#[derive(Debug, Clone)]
pub struct ResilienceConfig {
    /// Deadline for a credential refresh
    pub token_timeout: Duration,
    /// Tokens shorter than this are treated as corrupt
    pub min_token_len: usize,
    /// Wait after disabling the network so in-flight connections close
    pub disable_settle: Duration,
    /// Wait after re-enabling the network
    pub enable_settle: Duration,
    /// Retry policy for wrapped store calls
    pub retry: RetryPolicy,
    /// Sentinel document read by the health check
    pub sentinel: DocumentPath,
    /// Substrings marking provider artifacts in local storage
    pub artifact_markers: Vec<String>,
    /// Terminate the store client during escalation
    pub terminate_on_escalation: bool,
    /// Sign out when a terminal auth error is observed
    pub sign_out_on_terminal_auth: bool,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            token_timeout: Duration::from_secs(10),
            min_token_len: 50,
            disable_settle: Duration::from_millis(3000),
            enable_settle: Duration::from_millis(1000),
            retry: RetryPolicy::default(),
            sentinel: DocumentPath::new("health", "sentinel"),
            artifact_markers: vec!["firebase".to_string(), "firestore".to_string()],
            terminate_on_escalation: false,
            sign_out_on_terminal_auth: true,
        }
    }
}

impl ResilienceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from the environment (and `.env` if present).
    ///
    /// Missing or unparsable values fall back to defaults.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        let defaults = Self::default();

        let sentinel = std::env::var("WORKSHOP_SENTINEL_DOC")
            .ok()
            .and_then(|s| DocumentPath::parse(&s))
            .unwrap_or(defaults.sentinel);

        let artifact_markers = std::env::var("WORKSHOP_ARTIFACT_MARKERS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|m| m.trim().to_string())
                    .filter(|m| !m.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|markers| !markers.is_empty())
            .unwrap_or(defaults.artifact_markers);

        Self {
            token_timeout: env_millis("WORKSHOP_TOKEN_TIMEOUT_MS")
                .unwrap_or(defaults.token_timeout),
            min_token_len: env_parse("WORKSHOP_MIN_TOKEN_LEN").unwrap_or(defaults.min_token_len),
            disable_settle: env_millis("WORKSHOP_DISABLE_SETTLE_MS")
                .unwrap_or(defaults.disable_settle),
            enable_settle: env_millis("WORKSHOP_ENABLE_SETTLE_MS")
                .unwrap_or(defaults.enable_settle),
            retry: RetryPolicy {
                max_attempts: env_parse("WORKSHOP_RETRY_MAX_ATTEMPTS")
                    .unwrap_or(defaults.retry.max_attempts),
                base_delay: env_millis("WORKSHOP_RETRY_BASE_MS")
                    .unwrap_or(defaults.retry.base_delay),
                max_delay: env_millis("WORKSHOP_RETRY_MAX_MS").unwrap_or(defaults.retry.max_delay),
            },
            sentinel,
            artifact_markers,
            terminate_on_escalation: env_parse("WORKSHOP_TERMINATE_ON_ESCALATION")
                .unwrap_or(defaults.terminate_on_escalation),
            sign_out_on_terminal_auth: env_parse("WORKSHOP_SIGN_OUT_ON_TERMINAL_AUTH")
                .unwrap_or(defaults.sign_out_on_terminal_auth),
        }
    }

    /// Set both settle delays of the connection reset
    pub fn with_settle_delays(mut self, disable: Duration, enable: Duration) -> Self {
        self.disable_settle = disable;
        self.enable_settle = enable;
        self
    }

    pub fn with_token_timeout(mut self, timeout: Duration) -> Self {
        self.token_timeout = timeout;
        self
    }

    pub fn with_min_token_len(mut self, len: usize) -> Self {
        self.min_token_len = len;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_sentinel(mut self, sentinel: DocumentPath) -> Self {
        self.sentinel = sentinel;
        self
    }

    pub fn with_artifact_markers<I, S>(mut self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.artifact_markers = markers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_terminate_on_escalation(mut self, enabled: bool) -> Self {
        self.terminate_on_escalation = enabled;
        self
    }

    pub fn with_sign_out_on_terminal_auth(mut self, enabled: bool) -> Self {
        self.sign_out_on_terminal_auth = enabled;
        self
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn env_millis(key: &str) -> Option<Duration> {
    env_parse::<u64>(key).map(Duration::from_millis)
}
