//! Shared utilities for integration and load testing.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Uri};
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, ReadBuf};
use tokio::net::TcpListener;
use tokio_util::io::ReaderStream;

use resilient_client::config::{BreakerConfig, ResilienceConfig, RetryConfig};
use resilient_client::{Error, Request, Response, Result, Transport};

/// One scripted downstream reaction.
#[derive(Debug, Clone, Copy)]
pub enum Step {
    Status(u16),
    ConnectionRefused,
    /// Never answers.
    Hang,
}

/// Records what happened to a response body.
#[derive(Debug, Default)]
pub struct BodyTracker {
    read_to_end: AtomicBool,
    dropped: AtomicBool,
}

impl BodyTracker {
    /// The body was polled until it reported its end.
    pub fn read_to_end(&self) -> bool {
        self.read_to_end.load(Ordering::SeqCst)
    }

    pub fn dropped(&self) -> bool {
        self.dropped.load(Ordering::SeqCst)
    }
}

struct TrackedReader {
    remaining: Bytes,
    tracker: Arc<BodyTracker>,
}

impl AsyncRead for TrackedReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let n = self.remaining.len().min(buf.remaining());
        if n == 0 {
            self.tracker.read_to_end.store(true, Ordering::SeqCst);
        } else {
            let chunk = self.remaining.split_to(n);
            buf.put_slice(&chunk);
        }
        Poll::Ready(Ok(()))
    }
}

impl Drop for TrackedReader {
    fn drop(&mut self) {
        self.tracker.dropped.store(true, Ordering::SeqCst);
    }
}

/// A body that reports through the returned tracker.
pub fn tracked_body(content: impl Into<Bytes>) -> (Body, Arc<BodyTracker>) {
    let tracker = Arc::new(BodyTracker::default());
    let reader = TrackedReader {
        remaining: content.into(),
        tracker: tracker.clone(),
    };
    (Body::from_stream(ReaderStream::new(reader)), tracker)
}

/// In-memory transport that replays a script, then answers 200.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Step>>,
    fallback: Mutex<Option<Step>>,
    calls: AtomicU32,
    call_times: Mutex<Vec<Instant>>,
    bodies: Mutex<Vec<Arc<BodyTracker>>>,
}

impl ScriptedTransport {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(steps.into_iter().collect()),
            ..Default::default()
        })
    }

    /// Answer every call with `step`.
    pub fn always(step: Step) -> Arc<Self> {
        let transport = Self::new([]);
        *transport.fallback.lock().unwrap() = Some(step);
        transport
    }

    /// Change the answer once the script is exhausted.
    pub fn set_fallback(&self, step: Step) {
        *self.fallback.lock().unwrap() = Some(step);
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.call_times.lock().unwrap().clone()
    }

    /// Trackers for every response body handed out, in call order.
    pub fn bodies(&self) -> Vec<Arc<BodyTracker>> {
        self.bodies.lock().unwrap().clone()
    }

    fn next_step(&self) -> Step {
        if let Some(step) = self.script.lock().unwrap().pop_front() {
            return step;
        }
        self.fallback.lock().unwrap().unwrap_or(Step::Status(200))
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, _request: Request) -> Result<Response> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.call_times.lock().unwrap().push(Instant::now());

        match self.next_step() {
            Step::Status(code) => {
                let (body, tracker) = tracked_body(format!("status {code}"));
                self.bodies.lock().unwrap().push(tracker);
                Ok(axum::http::Response::builder()
                    .status(code)
                    .body(body)
                    .unwrap())
            }
            Step::ConnectionRefused => Err(Error::transport(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            ))),
            Step::Hang => std::future::pending().await,
        }
    }
}

pub fn get() -> Request {
    Request::get(Uri::from_static("http://downstream.local/users"))
}

pub fn post() -> Request {
    Request::new(Method::POST, Uri::from_static("http://downstream.local/users"))
        .with_body("{\"name\":\"ada\"}")
}

/// Config with short timers suitable for tests.
pub fn fast_config() -> ResilienceConfig {
    ResilienceConfig {
        breaker: BreakerConfig {
            name: "test-downstream".into(),
            window_ms: 0,
            open_timeout_ms: 100,
            half_open_max_requests: 2,
            min_requests: 10,
            failure_ratio: 0.5,
            consecutive_failures: 3,
        },
        retries: RetryConfig {
            max_retries: 2,
            base_delay_ms: 10,
            max_delay_ms: 40,
        },
        ..Default::default()
    }
}

/// Start a programmable raw-TCP HTTP backend on an ephemeral port.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let mut buf = [0u8; 4096];
                        let _ = socket.read(&mut buf).await;

                        let (status, body) = f().await;
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            429 => "429 Too Many Requests",
                            500 => "500 Internal Server Error",
                            502 => "502 Bad Gateway",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// An address nothing is listening on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}
