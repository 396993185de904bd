//! Retry logic.
//!
//! # Responsibilities
//! - Determine if a request is retryable (idempotent methods only)
//! - Decide after each attempt whether to stop or try again
//! - Execute retries with exponential backoff + jitter
//!
//! # Design Decisions
//! - Never retry POST/PUT/DELETE/PATCH (non-idempotent); they pass through once
//! - Statuses >= 500 and 429 are retried; other statuses are returned as-is
//! - Cancellation and deadline expiry stop the loop; every other error is
//!   treated as transient (including circuit rejections)
//! - The signal is checked before every attempt and interrupts sleeps
//! - No "retries exhausted" error: the last outcome is returned unchanged

use std::time::Duration;

use async_trait::async_trait;
use axum::http::{Method, StatusCode};
use tower::Layer;

use crate::config::RetryConfig;
use crate::error::Result;
use crate::observability::metrics;
use crate::resilience::backoff::Backoff;
use crate::transport::{drain, Request, Response, Transport};

/// Only side-effect-free verbs are retried.
pub fn is_retry_eligible(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// What to do after an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Stop,
    Retry,
}

/// Classify the outcome of one attempt.
pub fn decide(outcome: &Result<Response>) -> Decision {
    match outcome {
        Ok(response) => {
            let status = response.status();
            if status.as_u16() >= 500 || status == StatusCode::TOO_MANY_REQUESTS {
                Decision::Retry
            } else {
                Decision::Stop
            }
        }
        Err(err) if err.is_cancellation() => Decision::Stop,
        Err(_) => Decision::Retry,
    }
}

/// Retry budget and backoff bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Build a policy, clamping values into the supported range.
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        let max_retries = max_retries.max(1);
        let base_delay = if base_delay.is_zero() {
            Duration::from_millis(RetryConfig::default().base_delay_ms)
        } else {
            base_delay
        };
        let max_delay = if max_delay < base_delay {
            Duration::from_millis(RetryConfig::default().max_delay_ms).max(base_delay)
        } else {
            max_delay
        };
        Self {
            max_retries,
            base_delay,
            max_delay,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_retries,
            Duration::from_millis(config.base_delay_ms),
            Duration::from_millis(config.max_delay_ms),
        )
    }

    /// Total attempts for an eligible request.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    pub fn backoff(&self) -> Backoff {
        Backoff::new(self.base_delay, self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Transport decorator that re-issues idempotent requests on transient failure.
#[derive(Clone)]
pub struct RetryTransport<T> {
    inner: T,
    policy: RetryPolicy,
}

impl<T> RetryTransport<T> {
    pub fn new(inner: T, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

#[async_trait]
impl<T: Transport> Transport for RetryTransport<T> {
    async fn send(&self, request: Request) -> Result<Response> {
        let signal = request.signal().clone();
        if !is_retry_eligible(request.method()) {
            signal.check()?;
            return signal.guard(self.inner.send(request)).await;
        }

        let method = request.method().as_str().to_owned();
        let mut backoff = self.policy.backoff();
        let mut attempt = 1;

        loop {
            signal.check()?;
            let outcome = signal.guard(self.inner.send(request.clone())).await;

            if decide(&outcome) == Decision::Stop {
                metrics::record_attempt(&method, if outcome.is_ok() { "success" } else { "aborted" });
                return outcome;
            }
            if attempt >= self.policy.max_attempts() {
                metrics::record_attempt(&method, "exhausted");
                tracing::debug!(
                    request_id = %request.id(),
                    attempts = attempt,
                    "Retry budget exhausted"
                );
                return outcome;
            }
            metrics::record_attempt(&method, "retried");

            let reason = match outcome {
                Ok(response) => {
                    let status = response.status().to_string();
                    drain(response).await;
                    status
                }
                Err(err) => err.to_string(),
            };

            let delay = backoff.next_delay();
            tracing::debug!(
                request_id = %request.id(),
                attempt,
                delay = ?delay,
                reason = %reason,
                "Retrying request"
            );
            signal.sleep(delay).await?;
            attempt += 1;
        }
    }
}

/// Wraps a transport in a [`RetryTransport`].
#[derive(Debug, Clone, Default)]
pub struct RetryLayer {
    policy: RetryPolicy,
}

impl RetryLayer {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }
}

impl<T> Layer<T> for RetryLayer {
    type Service = RetryTransport<T>;

    fn layer(&self, inner: T) -> Self::Service {
        RetryTransport::new(inner, self.policy)
    }
}
