//! Downstream response handling.
//!
//! # Responsibilities
//! - Name the response type seen by every layer
//! - Release bodies that a layer decides to discard
//!
//! # Design Decisions
//! - Discarded bodies are read to the end so pooled connections can be reused
//! - Drain errors are logged and swallowed; the body is dropped either way

use axum::body::Body;

/// Response returned by every transport layer.
pub type Response = axum::http::Response<Body>;

/// Read a response body to its end and release it.
pub async fn drain(response: Response) {
    let status = response.status();
    match axum::body::to_bytes(response.into_body(), usize::MAX).await {
        Ok(bytes) => {
            tracing::trace!(status = %status, drained = bytes.len(), "Discarded response body");
        }
        Err(e) => {
            tracing::debug!(status = %status, error = %e, "Failed to drain response body");
        }
    }
}
