//! Transport capability subsystem.
//!
//! # Data Flow
//! ```text
//! caller builds Request (method, uri, headers, body, signal)
//!     → Transport::send
//!         → decorator (retry / circuit breaker) → ... → raw transport
//!     ← Result<Response, Error>
//! ```
//!
//! # Design Decisions
//! - One operation only: send a request, get a response or an error
//! - Decorators implement the same trait, so layers nest arbitrarily
//! - The raw transport is pluggable; `HyperTransport` is the default

pub mod http_client;
pub mod request;
pub mod response;
pub mod signal;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

pub use http_client::HyperTransport;
pub use request::{Request, RequestId, X_REQUEST_ID};
pub use response::{drain, Response};
pub use signal::CancelSignal;

/// Perform a request against the downstream dependency.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: Request) -> Result<Response>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, request: Request) -> Result<Response> {
        (**self).send(request).await
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn send(&self, request: Request) -> Result<Response> {
        (**self).send(request).await
    }
}
