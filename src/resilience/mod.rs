//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request from caller:
//!     → retries.rs (idempotent? check signal, attempt, back off, repeat)
//!         → circuit_breaker.rs (admit or fail fast, classify, update counts)
//!             → raw transport (network I/O)
//! ```
//!
//! # Design Decisions
//! - Retries only for idempotent requests (GET, HEAD, OPTIONS)
//! - Circuit breaker prevents cascading failures
//! - Both are `Transport` decorators with a `tower::Layer`, so the stack is
//!   assembled with `ServiceBuilder` and layers can be reordered or reused

pub mod backoff;
pub mod circuit_breaker;
pub mod retries;

use std::sync::Arc;

use tower::ServiceBuilder;

pub use backoff::Backoff;
pub use circuit_breaker::{
    BreakerSnapshot, CircuitBreaker, CircuitBreakerLayer, CircuitBreakerTransport, CircuitState,
    Counts, LifetimeCounts, Outcome, Permit,
};
pub use retries::{is_retry_eligible, RetryLayer, RetryPolicy, RetryTransport};

/// Retry layer wrapping a breaker layer wrapping the raw transport.
pub type Guarded<T> = RetryTransport<CircuitBreakerTransport<T>>;

/// Compose `retry ∘ breaker ∘ transport`.
pub fn guard<T>(transport: T, breaker: Arc<CircuitBreaker>, policy: RetryPolicy) -> Guarded<T> {
    ServiceBuilder::new()
        .layer(RetryLayer::new(policy))
        .layer(CircuitBreakerLayer::new(breaker))
        .service(transport)
}
