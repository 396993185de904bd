//! Circuit breaker for downstream protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: downstream assumed down, requests fail fast
//! - Half-Open: a bounded number of trial requests test recovery
//!
//! # State Transitions
//! ```text
//! Closed → Open: (requests >= min_requests && failures/requests >= failure_ratio)
//!                || consecutive_failures >= consecutive_failure_threshold
//! Open → Half-Open: open timeout elapsed
//! Half-Open → Closed: half_open_max_requests consecutive trial successes
//! Half-Open → Open: any trial failure (timeout restarts)
//! ```
//!
//! # Design Decisions
//! - One breaker per downstream target, constructed explicitly
//! - State, counts and transitions live behind a single mutex so the trip
//!   decision and the transition it causes are atomic
//! - Every transition (and every Closed window roll) starts a new
//!   generation; outcomes from an older generation are discarded
//! - Statuses >= 500 are failures; their bodies are drained before the
//!   error is reported
//! - Calls that end without an outcome (cancelled, dropped) only release
//!   their trial slot

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use async_trait::async_trait;
use serde::Serialize;
use tower::Layer;

use crate::config::{normalize_breaker_config, BreakerConfig};
use crate::error::{Error, Result};
use crate::observability::metrics;
use crate::transport::{drain, Request, Response, Transport};

/// Circuit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    HalfOpen,
    Open,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::HalfOpen => "half_open",
            CircuitState::Open => "open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request statistics for the current window / state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub requests: u32,
    pub total_successes: u32,
    pub total_failures: u32,
    pub consecutive_successes: u32,
    pub consecutive_failures: u32,
}

impl Counts {
    fn on_request(&mut self) {
        self.requests = self.requests.saturating_add(1);
    }

    fn on_success(&mut self) {
        self.total_successes = self.total_successes.saturating_add(1);
        self.consecutive_successes = self.consecutive_successes.saturating_add(1);
        self.consecutive_failures = 0;
    }

    fn on_failure(&mut self) {
        self.total_failures = self.total_failures.saturating_add(1);
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.consecutive_successes = 0;
    }

    fn clear(&mut self) {
        *self = Counts::default();
    }
}

/// Process-lifetime totals; never reset by windows or transitions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LifetimeCounts {
    pub requests: u64,
    pub successes: u64,
    pub failures: u64,
    pub rejections: u64,
}

#[derive(Debug, Default)]
struct LifetimeCounters {
    requests: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    rejections: AtomicU64,
}

impl LifetimeCounters {
    fn load(&self) -> LifetimeCounts {
        LifetimeCounts {
            requests: self.requests.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            rejections: self.rejections.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of a breaker for external reporting.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub name: String,
    pub state: CircuitState,
    pub counts: Counts,
    pub lifetime: LifetimeCounts,
    /// Remaining open time in ms, if currently open.
    pub open_remaining_ms: Option<u64>,
}

/// Outcome of an admitted call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
    /// The call ended without a verdict (cancelled or dropped).
    Abandoned,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    generation: u64,
    counts: Counts,
    /// Closed: end of the current window. Open: end of the open timeout.
    expiry: Option<Instant>,
    trials_in_flight: u32,
}

/// Circuit breaker state machine, shared by every call to one downstream.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: BreakerConfig,
    inner: Mutex<Inner>,
    lifetime: LifetimeCounters,
}

impl CircuitBreaker {
    /// Create a breaker in the Closed state.
    ///
    /// Out-of-range settings are replaced with their defaults, using the same
    /// rules as [`crate::config::normalize`].
    pub fn new(mut config: BreakerConfig) -> Self {
        for adjustment in normalize_breaker_config(&mut config) {
            tracing::warn!(
                breaker = %config.name,
                %adjustment,
                "Breaker setting replaced with default"
            );
        }

        let now = Instant::now();
        let expiry = config.window().map(|w| now + w);
        Self {
            config,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                generation: 0,
                counts: Counts::default(),
                expiry,
                trials_in_flight: 0,
            }),
            lifetime: LifetimeCounters::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// Current state, applying any timed transition that is due.
    pub fn state(&self) -> CircuitState {
        let mut inner = self.lock();
        self.refresh(&mut inner, Instant::now());
        inner.state
    }

    /// Counts for the current window / state.
    pub fn counts(&self) -> Counts {
        let mut inner = self.lock();
        self.refresh(&mut inner, Instant::now());
        inner.counts
    }

    /// Snapshot of state and counts. Holds the lock only to copy.
    pub fn snapshot(&self) -> BreakerSnapshot {
        let now = Instant::now();
        let (state, counts, expiry) = {
            let mut inner = self.lock();
            self.refresh(&mut inner, now);
            (inner.state, inner.counts, inner.expiry)
        };
        let open_remaining_ms = match (state, expiry) {
            (CircuitState::Open, Some(until)) => {
                Some(until.saturating_duration_since(now).as_millis() as u64)
            }
            _ => None,
        };
        BreakerSnapshot {
            name: self.config.name.clone(),
            state,
            counts,
            lifetime: self.lifetime.load(),
            open_remaining_ms,
        }
    }

    /// Ask to send one call downstream.
    ///
    /// Returns a [`Permit`] that must be settled with the call's outcome,
    /// or the rejection error when the circuit refuses the call.
    pub fn try_acquire(&self) -> Result<Permit<'_>> {
        let now = Instant::now();
        let mut inner = self.lock();
        self.refresh(&mut inner, now);

        let state = inner.state;
        match state {
            CircuitState::Open => {
                drop(inner);
                return Err(self.reject("open", |name| Error::CircuitOpen { name }));
            }
            CircuitState::HalfOpen if inner.trials_in_flight >= self.config.half_open_max_requests => {
                drop(inner);
                return Err(self.reject("trial_budget", |name| {
                    Error::TrialBudgetExhausted { name }
                }));
            }
            CircuitState::HalfOpen => inner.trials_in_flight += 1,
            CircuitState::Closed => {}
        }

        inner.counts.on_request();
        self.lifetime.requests.fetch_add(1, Ordering::Relaxed);
        Ok(Permit {
            breaker: self,
            generation: inner.generation,
            settled: false,
        })
    }

    /// Force the circuit Closed with fresh counts.
    pub fn reset(&self) {
        let mut inner = self.lock();
        self.transition(&mut inner, CircuitState::Closed, Instant::now());
    }

    /// Force the circuit Open; the open timeout starts now.
    pub fn trip(&self) {
        let mut inner = self.lock();
        self.transition(&mut inner, CircuitState::Open, Instant::now());
    }

    fn reject(&self, reason: &'static str, err: fn(String) -> Error) -> Error {
        self.lifetime.rejections.fetch_add(1, Ordering::Relaxed);
        metrics::record_rejection(&self.config.name, reason);
        tracing::debug!(breaker = %self.config.name, reason, "Call rejected by circuit breaker");
        err(self.config.name.clone())
    }

    fn settle(&self, generation: u64, outcome: Outcome) {
        match outcome {
            Outcome::Success => {
                self.lifetime.successes.fetch_add(1, Ordering::Relaxed);
            }
            Outcome::Failure => {
                self.lifetime.failures.fetch_add(1, Ordering::Relaxed);
            }
            Outcome::Abandoned => {}
        }

        let now = Instant::now();
        let mut inner = self.lock();
        self.refresh(&mut inner, now);
        if inner.generation != generation {
            return;
        }

        let state = inner.state;
        if state == CircuitState::HalfOpen {
            inner.trials_in_flight = inner.trials_in_flight.saturating_sub(1);
        }

        match outcome {
            Outcome::Success => {
                inner.counts.on_success();
                match state {
                    CircuitState::Closed if self.ready_to_trip(&inner.counts) => {
                        self.transition(&mut inner, CircuitState::Open, now);
                    }
                    CircuitState::HalfOpen
                        if inner.counts.consecutive_successes >= self.config.half_open_max_requests =>
                    {
                        self.transition(&mut inner, CircuitState::Closed, now);
                    }
                    _ => {}
                }
            }
            Outcome::Failure => {
                inner.counts.on_failure();
                match state {
                    CircuitState::Closed if self.ready_to_trip(&inner.counts) => {
                        self.transition(&mut inner, CircuitState::Open, now);
                    }
                    CircuitState::HalfOpen => {
                        self.transition(&mut inner, CircuitState::Open, now);
                    }
                    _ => {}
                }
            }
            Outcome::Abandoned => {}
        }
    }

    fn ready_to_trip(&self, counts: &Counts) -> bool {
        let by_ratio = counts.requests >= self.config.min_requests
            && counts.requests > 0
            && f64::from(counts.total_failures) / f64::from(counts.requests)
                >= self.config.failure_ratio;
        by_ratio || counts.consecutive_failures >= self.config.consecutive_failures
    }

    /// Apply timed transitions: window roll in Closed, Open → Half-Open.
    fn refresh(&self, inner: &mut Inner, now: Instant) {
        match (inner.state, inner.expiry) {
            (CircuitState::Closed, Some(expiry)) if now >= expiry => {
                inner.generation = inner.generation.wrapping_add(1);
                inner.counts.clear();
                inner.expiry = self.config.window().map(|w| now + w);
            }
            (CircuitState::Open, Some(expiry)) if now >= expiry => {
                self.transition(inner, CircuitState::HalfOpen, now);
            }
            _ => {}
        }
    }

    fn transition(&self, inner: &mut Inner, to: CircuitState, now: Instant) {
        let from = inner.state;
        let counts = inner.counts;

        inner.state = to;
        inner.generation = inner.generation.wrapping_add(1);
        inner.counts.clear();
        inner.trials_in_flight = 0;
        inner.expiry = match to {
            CircuitState::Closed => self.config.window().map(|w| now + w),
            CircuitState::Open => Some(now + self.config.open_timeout()),
            CircuitState::HalfOpen => None,
        };

        if from == to {
            return;
        }
        metrics::record_transition(&self.config.name, to);
        if to == CircuitState::Open {
            tracing::warn!(
                breaker = %self.config.name,
                from = %from,
                to = %to,
                requests = counts.requests,
                failures = counts.total_failures,
                consecutive_failures = counts.consecutive_failures,
                "Circuit opened"
            );
        } else {
            tracing::info!(breaker = %self.config.name, from = %from, to = %to, "Circuit state changed");
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Admission ticket for one call.
///
/// Dropping an unsettled permit records [`Outcome::Abandoned`].
#[must_use = "a permit must be settled with the call outcome"]
pub struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    generation: u64,
    settled: bool,
}

impl Permit<'_> {
    pub fn record(mut self, outcome: Outcome) {
        self.settled = true;
        self.breaker.settle(self.generation, outcome);
    }

    pub fn record_success(self) {
        self.record(Outcome::Success);
    }

    pub fn record_failure(self) {
        self.record(Outcome::Failure);
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.settle(self.generation, Outcome::Abandoned);
        }
    }
}

/// Transport decorator guarding `inner` with a shared [`CircuitBreaker`].
#[derive(Clone)]
pub struct CircuitBreakerTransport<T> {
    inner: T,
    breaker: Arc<CircuitBreaker>,
}

impl<T> CircuitBreakerTransport<T> {
    pub fn new(inner: T, breaker: Arc<CircuitBreaker>) -> Self {
        Self { inner, breaker }
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

#[async_trait]
impl<T: Transport> Transport for CircuitBreakerTransport<T> {
    async fn send(&self, request: Request) -> Result<Response> {
        let permit = self.breaker.try_acquire()?;
        let request_id = request.id();

        match self.inner.send(request).await {
            Ok(response) if response.status().as_u16() >= 500 => {
                let status = response.status();
                drain(response).await;
                permit.record_failure();
                tracing::debug!(
                    breaker = %self.breaker.name(),
                    request_id = %request_id,
                    status = %status,
                    "Downstream server error"
                );
                Err(Error::ServerError { status })
            }
            Ok(response) => {
                permit.record_success();
                Ok(response)
            }
            Err(err) if err.is_cancellation() => {
                permit.record(Outcome::Abandoned);
                Err(err)
            }
            Err(err) => {
                permit.record_failure();
                tracing::debug!(
                    breaker = %self.breaker.name(),
                    request_id = %request_id,
                    error = %err,
                    "Downstream call failed"
                );
                Err(err)
            }
        }
    }
}

/// Wraps a transport in a [`CircuitBreakerTransport`] sharing one breaker.
#[derive(Clone)]
pub struct CircuitBreakerLayer {
    breaker: Arc<CircuitBreaker>,
}

impl CircuitBreakerLayer {
    pub fn new(breaker: Arc<CircuitBreaker>) -> Self {
        Self { breaker }
    }
}

impl<T> Layer<T> for CircuitBreakerLayer {
    type Service = CircuitBreakerTransport<T>;

    fn layer(&self, inner: T) -> Self::Service {
        CircuitBreakerTransport::new(inner, self.breaker.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    fn config() -> BreakerConfig {
        BreakerConfig {
            name: "test".into(),
            window_ms: 0,
            open_timeout_ms: 50,
            half_open_max_requests: 2,
            min_requests: 5,
            failure_ratio: 0.5,
            consecutive_failures: 3,
        }
    }

    fn fail(cb: &CircuitBreaker) {
        cb.try_acquire().unwrap().record_failure();
    }

    fn succeed(cb: &CircuitBreaker) {
        cb.try_acquire().unwrap().record_success();
    }

    #[test]
    fn test_initial_state() {
        let cb = CircuitBreaker::new(config());
        let snapshot = cb.snapshot();
        assert_eq!(snapshot.state, CircuitState::Closed);
        assert_eq!(snapshot.counts, Counts::default());
        assert!(snapshot.open_remaining_ms.is_none());
    }

    #[test]
    fn test_counts_track_outcomes() {
        let cb = CircuitBreaker::new(config());
        succeed(&cb);
        fail(&cb);
        succeed(&cb);

        let counts = cb.counts();
        assert_eq!(counts.requests, 3);
        assert_eq!(counts.total_successes, 2);
        assert_eq!(counts.total_failures, 1);
        assert_eq!(counts.consecutive_successes, 1);
        assert_eq!(counts.consecutive_failures, 0);
    }

    #[test]
    fn test_opens_on_consecutive_failures() {
        let cb = CircuitBreaker::new(config());
        fail(&cb);
        fail(&cb);
        assert_eq!(cb.state(), CircuitState::Closed);

        fail(&cb);
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(matches!(cb.try_acquire(), Err(Error::CircuitOpen { .. })));
        assert_eq!(cb.counts(), Counts::default());
    }

    #[test]
    fn test_opens_on_failure_ratio() {
        let mut cfg = config();
        cfg.consecutive_failures = 100;
        let cb = CircuitBreaker::new(cfg);

        // 2 failures out of 4: below min_requests
        fail(&cb);
        succeed(&cb);
        fail(&cb);
        succeed(&cb);
        assert_eq!(cb.state(), CircuitState::Closed);

        // 3 out of 5 reaches min_requests with ratio 0.6
        fail(&cb);
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn test_ratio_checked_after_success_too() {
        let mut cfg = config();
        cfg.consecutive_failures = 100;
        let cb = CircuitBreaker::new(cfg);

        fail(&cb);
        fail(&cb);
        fail(&cb);
        succeed(&cb);
        assert_eq!(cb.state(), CircuitState::Closed);

        // 3 of 5 failed once the fifth (successful) call lands
        succeed(&cb);
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn test_half_open_after_timeout() {
        let cb = CircuitBreaker::new(config());
        cb.trip();
        assert!(cb.snapshot().open_remaining_ms.is_some());
        assert!(cb.try_acquire().is_err());

        thread::sleep(Duration::from_millis(70));
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert!(cb.try_acquire().is_ok());
    }

    #[test]
    fn test_half_open_trial_budget() {
        let cb = CircuitBreaker::new(config());
        cb.trip();
        thread::sleep(Duration::from_millis(70));

        let first = cb.try_acquire().unwrap();
        let second = cb.try_acquire().unwrap();
        assert!(matches!(
            cb.try_acquire(),
            Err(Error::TrialBudgetExhausted { .. })
        ));

        first.record_success();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        second.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.counts(), Counts::default());
    }

    #[test]
    fn test_half_open_failure_reopens() {
        let cb = CircuitBreaker::new(config());
        cb.trip();
        thread::sleep(Duration::from_millis(70));

        succeed(&cb);
        fail(&cb);
        assert_eq!(cb.state(), CircuitState::Open);
        let remaining = cb.snapshot().open_remaining_ms.unwrap();
        assert!(remaining > 20, "timeout should restart, got {remaining}ms");
    }

    #[test]
    fn test_dropped_permit_releases_trial_slot() {
        let cb = CircuitBreaker::new(config());
        cb.trip();
        thread::sleep(Duration::from_millis(70));

        let a = cb.try_acquire().unwrap();
        let b = cb.try_acquire().unwrap();
        drop(a);
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        let c = cb.try_acquire().unwrap();
        b.record_success();
        c.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_stale_outcome_ignored() {
        let cb = CircuitBreaker::new(config());
        let late = cb.try_acquire().unwrap();
        cb.reset();
        late.record_failure();
        assert_eq!(cb.counts(), Counts::default());
    }

    #[test]
    fn test_window_roll_clears_counts() {
        let mut cfg = config();
        cfg.window_ms = 40;
        let cb = CircuitBreaker::new(cfg);

        fail(&cb);
        fail(&cb);
        thread::sleep(Duration::from_millis(60));
        assert_eq!(cb.counts(), Counts::default());

        // Two more failures stay below the consecutive threshold again
        fail(&cb);
        fail(&cb);
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_lifetime_counts_survive_transitions() {
        let cb = CircuitBreaker::new(config());
        succeed(&cb);
        fail(&cb);
        fail(&cb);
        fail(&cb);
        let _ = cb.try_acquire();

        let lifetime = cb.snapshot().lifetime;
        assert_eq!(lifetime.requests, 4);
        assert_eq!(lifetime.successes, 1);
        assert_eq!(lifetime.failures, 3);
        assert_eq!(lifetime.rejections, 1);
    }

    #[test]
    fn test_concurrent_failures_trip_once() {
        let mut cfg = config();
        cfg.consecutive_failures = 50;
        cfg.min_requests = 1_000;
        cfg.open_timeout_ms = 60_000;
        let cb = Arc::new(CircuitBreaker::new(cfg));

        let mut handles = vec![];
        for _ in 0..10 {
            let cb = Arc::clone(&cb);
            handles.push(thread::spawn(move || {
                for _ in 0..10 {
                    if let Ok(permit) = cb.try_acquire() {
                        permit.record_failure();
                    }
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        // Outcomes that land after the trip belong to an old generation, so
        // admissions can overshoot the threshold but never the total.
        let snapshot = cb.snapshot();
        assert_eq!(snapshot.state, CircuitState::Open);
        assert!(snapshot.lifetime.requests >= 50);
        assert_eq!(snapshot.lifetime.requests + snapshot.lifetime.rejections, 100);
        assert_eq!(snapshot.counts, Counts::default());
    }

    #[test]
    fn test_zero_settings_fall_back_to_defaults() {
        let mut cfg = config();
        cfg.half_open_max_requests = 0;
        cfg.consecutive_failures = 0;
        cfg.min_requests = 0;
        cfg.failure_ratio = 0.0;
        let cb = CircuitBreaker::new(cfg);

        assert_eq!(cb.config().half_open_max_requests, 1);
        assert_eq!(cb.config().consecutive_failures, 5);
        assert_eq!(cb.config().min_requests, 1);
        assert_eq!(cb.config().failure_ratio, 0.5);

        succeed(&cb);
        assert_eq!(cb.state(), CircuitState::Closed);

        cb.trip();
        thread::sleep(Duration::from_millis(70));
        succeed(&cb);
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_snapshot_serializes() {
        let cb = CircuitBreaker::new(config());
        let json = serde_json::to_value(cb.snapshot()).unwrap();
        assert_eq!(json["name"], "test");
        assert_eq!(json["state"], "closed");
        assert_eq!(json["counts"]["requests"], 0);
    }
}
