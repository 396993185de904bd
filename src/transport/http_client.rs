//! Raw HTTP transport over a pooled hyper client.
//!
//! # Responsibilities
//! - Perform exactly one network round trip per call
//! - Enforce connect and per-request timeouts
//!
//! # Design Decisions
//! - No classification here: any response is `Ok`, even a 5xx
//! - Timeouts surface as `Error::Timeout`, other failures as `Error::Transport`

use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::{TokioExecutor, TokioTimer},
};

use crate::config::TransportConfig;
use crate::error::{Error, Result};
use crate::transport::{Request, Response, Transport};

/// Pooled HTTP/1.1 + HTTP/2 client.
#[derive(Clone)]
pub struct HyperTransport {
    client: Client<HttpConnector, Body>,
    request_timeout: Duration,
}

impl HyperTransport {
    pub fn new(config: &TransportConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(config.connect_timeout()));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new())
            .pool_timer(TokioTimer::new())
            .pool_idle_timeout(config.pool_idle_timeout())
            .build(connector);

        Self {
            client,
            request_timeout: config.request_timeout(),
        }
    }
}

impl Default for HyperTransport {
    fn default() -> Self {
        Self::new(&TransportConfig::default())
    }
}

#[async_trait]
impl Transport for HyperTransport {
    async fn send(&self, request: Request) -> Result<Response> {
        let wire = request.to_http()?;

        tracing::trace!(
            request_id = %request.id(),
            method = %request.method(),
            uri = %request.uri(),
            "Sending downstream request"
        );

        match tokio::time::timeout(self.request_timeout, self.client.request(wire)).await {
            Ok(Ok(response)) => Ok(into_response(response)),
            Ok(Err(e)) => Err(Error::transport(e)),
            Err(_) => Err(Error::Timeout(self.request_timeout)),
        }
    }
}

fn into_response(response: hyper::Response<Incoming>) -> Response {
    response.map(Body::new)
}
