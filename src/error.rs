//! Error taxonomy shared by every layer of the stack.
//!
//! # Categories
//! - Transport failures (`Transport`, `Timeout`): opaque network-level errors
//! - Server failures (`ServerError`): status >= 500 turned into an error by the breaker
//! - Circuit rejections (`CircuitOpen`, `TrialBudgetExhausted`): fail fast, downstream untouched
//! - Cancellation (`Cancelled`, `DeadlineExceeded`): terminal, never retried past
//!
//! # Design Decisions
//! - Decorators surface inner errors unchanged; they only add rejections
//! - No "retries exhausted" variant: the last attempt's outcome is the result

use std::time::Duration;

use axum::http::StatusCode;
use thiserror::Error;

/// Boxed error used for opaque transport failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result alias used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// Connection-level failure reported by the raw transport.
    #[error("transport error: {0}")]
    Transport(#[source] BoxError),

    /// The raw transport gave up waiting for the downstream.
    #[error("downstream did not respond within {0:?}")]
    Timeout(Duration),

    /// The downstream answered with a 5xx status.
    #[error("server error: {status}")]
    ServerError { status: StatusCode },

    /// The breaker is open and the call was rejected without being sent.
    #[error("circuit breaker '{name}' is open")]
    CircuitOpen { name: String },

    /// The breaker is half-open and every trial slot is taken.
    #[error("circuit breaker '{name}' is half-open and its trial budget is exhausted")]
    TrialBudgetExhausted { name: String },

    #[error("request cancelled")]
    Cancelled,

    #[error("request deadline exceeded")]
    DeadlineExceeded,

    /// The request could not be turned into a wire request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl Error {
    /// Wrap any error as an opaque transport failure.
    pub fn transport(err: impl Into<BoxError>) -> Self {
        Error::Transport(err.into())
    }

    /// True for caller-side cancellation and deadline expiry.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::Cancelled | Error::DeadlineExceeded)
    }

    /// True when a breaker refused the call without forwarding it.
    pub fn is_circuit_rejection(&self) -> bool {
        matches!(
            self,
            Error::CircuitOpen { .. } | Error::TrialBudgetExhausted { .. }
        )
    }
}
