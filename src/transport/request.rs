//! Outbound request model.
//!
//! # Responsibilities
//! - Carry method, target, headers and a buffered body
//! - Generate a unique request ID for log correlation
//! - Carry the caller's cancellation/deadline signal
//!
//! # Design Decisions
//! - Body is buffered so every retry attempt sends identical bytes
//! - Cloning is cheap (`Bytes` and the token are reference counted)
//! - Request ID is propagated downstream as `x-request-id`

use std::fmt;
use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, Uri};
use bytes::Bytes;
use tokio::time::Instant;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::transport::signal::CancelSignal;

/// Header used to propagate request IDs.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Unique ID attached to every outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A request to the downstream dependency.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    id: RequestId,
    signal: CancelSignal,
}

impl Request {
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            id: RequestId::new(),
            signal: CancelSignal::new(),
        }
    }

    pub fn get(uri: Uri) -> Self {
        Self::new(Method::GET, uri)
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_signal(mut self, signal: CancelSignal) -> Self {
        self.signal = signal;
        self
    }

    /// Give the request a deadline `timeout` from now.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.signal = self.signal.with_timeout(timeout);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.signal = self.signal.with_deadline(deadline);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn signal(&self) -> &CancelSignal {
        &self.signal
    }

    /// Build the wire request for one attempt.
    pub fn to_http(&self) -> Result<axum::http::Request<Body>> {
        let mut builder = axum::http::Request::builder()
            .method(self.method.clone())
            .uri(self.uri.clone());

        if let Some(headers) = builder.headers_mut() {
            headers.extend(self.headers.clone());
            if !headers.contains_key(X_REQUEST_ID) {
                let id = HeaderValue::from_str(&self.id.to_string())
                    .map_err(|e| Error::InvalidRequest(e.to_string()))?;
                headers.insert(X_REQUEST_ID, id);
            }
        }

        builder
            .body(Body::from(self.body.clone()))
            .map_err(|e| Error::InvalidRequest(e.to_string()))
    }
}
