//! Resilient client for a single downstream HTTP dependency.
//!
//! A circuit breaker and a bounded, jittered retry policy, both written as
//! decorators over one `Transport` capability:
//!
//! ```text
//! caller → RetryTransport → CircuitBreakerTransport → raw Transport → downstream
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod transport;

pub use client::ResilientClient;
pub use config::ResilienceConfig;
pub use error::{Error, Result};
pub use lifecycle::Shutdown;
pub use resilience::{BreakerSnapshot, CircuitBreaker, CircuitState, Counts, RetryPolicy};
pub use transport::{CancelSignal, HyperTransport, Request, Response, Transport};
