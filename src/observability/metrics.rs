//! Metrics emitted by the resilience layers.
//!
//! # Metrics
//! - `circuit_breaker_transitions_total` (counter): state changes by breaker, target state
//! - `circuit_breaker_rejections_total` (counter): fail-fast rejections by breaker, reason
//! - `retry_attempts_total` (counter): retry-layer attempts by method, outcome
//!
//! # Design Decisions
//! - Recorded through the `metrics` facade; exporting is the host's concern
//! - Labels are low-cardinality (no URIs, no request IDs)

use metrics::counter;

use crate::resilience::circuit_breaker::CircuitState;

pub fn record_transition(breaker: &str, to: CircuitState) {
    counter!(
        "circuit_breaker_transitions_total",
        "breaker" => breaker.to_string(),
        "to" => to.as_str()
    )
    .increment(1);
}

pub fn record_rejection(breaker: &str, reason: &'static str) {
    counter!(
        "circuit_breaker_rejections_total",
        "breaker" => breaker.to_string(),
        "reason" => reason
    )
    .increment(1);
}

pub fn record_attempt(method: &str, outcome: &'static str) {
    counter!(
        "retry_attempts_total",
        "method" => method.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}
