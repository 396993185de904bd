//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.
//! Durations are stored as integer milliseconds/seconds and exposed as
//! `Duration` through accessor methods.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for one protected downstream target.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Circuit breaker settings.
    pub breaker: BreakerConfig,

    /// Retry configuration.
    pub retries: RetryConfig,

    /// Raw transport timeouts.
    pub transport: TransportConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct BreakerConfig {
    /// Breaker name used in logs, errors and snapshots.
    pub name: String,

    /// Length of the Closed-state evaluation window in milliseconds.
    /// Zero keeps counts until the next state transition.
    pub window_ms: u64,

    /// Time spent Open before trial calls are allowed, in milliseconds.
    pub open_timeout_ms: u64,

    /// Trial calls allowed in flight while Half-Open; the same number of
    /// consecutive trial successes closes the circuit.
    pub half_open_max_requests: u32,

    /// Requests needed in the window before the failure ratio applies.
    pub min_requests: u32,

    /// Failure ratio (failures / requests) that trips the circuit.
    pub failure_ratio: f64,

    /// Consecutive failures that trip the circuit.
    pub consecutive_failures: u32,
}

impl BreakerConfig {
    pub fn window(&self) -> Option<Duration> {
        (self.window_ms > 0).then(|| Duration::from_millis(self.window_ms))
    }

    pub fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.open_timeout_ms)
    }
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            name: "downstream".to_string(),
            window_ms: 30_000,
            open_timeout_ms: 2_000,
            half_open_max_requests: 2,
            min_requests: 5,
            failure_ratio: 0.5,
            consecutive_failures: 5,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 2000,
        }
    }
}

/// Timeouts for the raw HTTP transport.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct TransportConfig {
    /// Connection establishment timeout in milliseconds.
    pub connect_timeout_ms: u64,

    /// Time allowed for a single round trip in milliseconds.
    pub request_timeout_ms: u64,

    /// Idle pooled connection timeout in seconds.
    pub pool_idle_timeout_secs: u64,
}

impl TransportConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn pool_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.pool_idle_timeout_secs)
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 5_000,
            request_timeout_ms: 30_000,
            pool_idle_timeout_secs: 60,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Pretty output for development, JSON for production.
    pub log_format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}
