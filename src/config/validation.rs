//! Configuration normalization.
//!
//! # Responsibilities
//! - Replace out-of-range values with safe defaults
//! - Guarantee the invariants the algorithms rely on:
//!   max_retries >= 1, base delay > 0, max delay >= base delay,
//!   a non-zero half-open budget and a failure ratio in (0, 1]
//!
//! # Design Decisions
//! - Never rejects a config; every problem has a documented fallback
//! - Returns every adjustment so the caller can log them
//! - Pure function: ResilienceConfig → (ResilienceConfig, Vec<Adjustment>)

use std::fmt;

use crate::config::schema::{BreakerConfig, ResilienceConfig, RetryConfig, TransportConfig};

/// A value that was replaced during normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct Adjustment {
    pub field: &'static str,
    pub from: String,
    pub to: String,
}

impl fmt::Display for Adjustment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} -> {}", self.field, self.from, self.to)
    }
}

/// Normalize `config` in place and report what changed.
pub fn normalize(config: &mut ResilienceConfig) -> Vec<Adjustment> {
    let mut adjustments = Vec::new();
    normalize_retries(&mut config.retries, &mut adjustments);
    normalize_breaker(&mut config.breaker, &mut adjustments);
    normalize_transport(&mut config.transport, &mut adjustments);
    adjustments
}

fn adjust<T: fmt::Display>(
    out: &mut Vec<Adjustment>,
    field: &'static str,
    slot: &mut T,
    value: T,
) {
    out.push(Adjustment {
        field,
        from: slot.to_string(),
        to: value.to_string(),
    });
    *slot = value;
}

fn normalize_retries(cfg: &mut RetryConfig, out: &mut Vec<Adjustment>) {
    let defaults = RetryConfig::default();
    if cfg.max_retries < 1 {
        adjust(out, "retries.max_retries", &mut cfg.max_retries, 1);
    }
    if cfg.base_delay_ms == 0 {
        adjust(out, "retries.base_delay_ms", &mut cfg.base_delay_ms, defaults.base_delay_ms);
    }
    if cfg.max_delay_ms < cfg.base_delay_ms {
        let max = defaults.max_delay_ms.max(cfg.base_delay_ms);
        adjust(out, "retries.max_delay_ms", &mut cfg.max_delay_ms, max);
    }
}

/// Normalize breaker settings alone; used by [`crate::CircuitBreaker::new`].
pub fn normalize_breaker_config(cfg: &mut BreakerConfig) -> Vec<Adjustment> {
    let mut adjustments = Vec::new();
    normalize_breaker(cfg, &mut adjustments);
    adjustments
}

fn normalize_breaker(cfg: &mut BreakerConfig, out: &mut Vec<Adjustment>) {
    let defaults = BreakerConfig::default();
    if cfg.name.trim().is_empty() {
        adjust(out, "breaker.name", &mut cfg.name, defaults.name.clone());
    }
    if cfg.half_open_max_requests == 0 {
        adjust(out, "breaker.half_open_max_requests", &mut cfg.half_open_max_requests, 1);
    }
    if cfg.open_timeout_ms == 0 {
        adjust(out, "breaker.open_timeout_ms", &mut cfg.open_timeout_ms, defaults.open_timeout_ms);
    }
    if cfg.min_requests == 0 {
        adjust(out, "breaker.min_requests", &mut cfg.min_requests, 1);
    }
    if cfg.consecutive_failures == 0 {
        adjust(
            out,
            "breaker.consecutive_failures",
            &mut cfg.consecutive_failures,
            defaults.consecutive_failures,
        );
    }
    let ratio = cfg.failure_ratio;
    if !ratio.is_finite() || ratio <= 0.0 || ratio > 1.0 {
        adjust(out, "breaker.failure_ratio", &mut cfg.failure_ratio, defaults.failure_ratio);
    }
}

fn normalize_transport(cfg: &mut TransportConfig, out: &mut Vec<Adjustment>) {
    let defaults = TransportConfig::default();
    if cfg.connect_timeout_ms == 0 {
        adjust(
            out,
            "transport.connect_timeout_ms",
            &mut cfg.connect_timeout_ms,
            defaults.connect_timeout_ms,
        );
    }
    if cfg.request_timeout_ms == 0 {
        adjust(
            out,
            "transport.request_timeout_ms",
            &mut cfg.request_timeout_ms,
            defaults.request_timeout_ms,
        );
    }
}
