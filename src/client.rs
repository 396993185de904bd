//! Assembled client for one downstream target.
//!
//! # Responsibilities
//! - Build the retry ∘ circuit breaker ∘ transport stack from config
//! - Expose the breaker snapshot for external reporting
//!
//! # Design Decisions
//! - One client (and one breaker) per downstream, created at startup
//! - The client is itself a `Transport`, so it can be wrapped further

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::ResilienceConfig;
use crate::error::Result;
use crate::resilience::{self, BreakerSnapshot, CircuitBreaker, Guarded, RetryPolicy};
use crate::transport::{HyperTransport, Request, Response, Transport};

/// Resilient client guarding one downstream dependency.
pub struct ResilientClient<T> {
    stack: Guarded<T>,
    breaker: Arc<CircuitBreaker>,
}

impl<T: Transport> ResilientClient<T> {
    /// Wrap `transport` using the breaker and retry settings in `config`.
    ///
    /// `config` is expected to be normalized.
    pub fn new(transport: T, config: &ResilienceConfig) -> Self {
        let breaker = Arc::new(CircuitBreaker::new(config.breaker.clone()));
        let policy = RetryPolicy::from_config(&config.retries);

        tracing::info!(
            breaker = %breaker.name(),
            max_retries = policy.max_retries,
            base_delay = ?policy.base_delay,
            max_delay = ?policy.max_delay,
            "Resilient client created"
        );

        Self::from_parts(transport, breaker, policy)
    }

    /// Build from an existing breaker, e.g. one shared with other code paths.
    pub fn from_parts(transport: T, breaker: Arc<CircuitBreaker>, policy: RetryPolicy) -> Self {
        Self {
            stack: resilience::guard(transport, breaker.clone(), policy),
            breaker,
        }
    }

    pub async fn send(&self, request: Request) -> Result<Response> {
        self.stack.send(request).await
    }

    /// Current circuit state and counts.
    pub fn status(&self) -> BreakerSnapshot {
        self.breaker.snapshot()
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        self.stack.policy()
    }
}

impl ResilientClient<HyperTransport> {
    /// Client over the default hyper transport.
    pub fn http(config: &ResilienceConfig) -> Self {
        Self::new(HyperTransport::new(&config.transport), config)
    }
}

#[async_trait]
impl<T: Transport> Transport for ResilientClient<T> {
    async fn send(&self, request: Request) -> Result<Response> {
        self.stack.send(request).await
    }
}
