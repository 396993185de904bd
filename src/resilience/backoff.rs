//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

/// Backoff state for one request's retry loop.
///
/// Each call to [`Backoff::next_delay`] returns `delay + jitter`, with jitter
/// drawn uniformly from `[0, delay / 2)` and the sum capped at `max`. The
/// base delay then doubles, also capped at `max`.
#[derive(Debug, Clone)]
pub struct Backoff {
    delay: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            delay: base,
            max: max.max(base),
        }
    }

    /// Delay before the next retry.
    pub fn next_delay(&mut self) -> Duration {
        let sleep = (self.delay + jitter(self.delay / 2)).min(self.max);
        self.delay = self.delay.saturating_mul(2).min(self.max);
        sleep
    }
}

fn jitter(range: Duration) -> Duration {
    let range_nanos = u64::try_from(range.as_nanos()).unwrap_or(u64::MAX);
    if range_nanos == 0 {
        return Duration::ZERO;
    }
    Duration::from_nanos(rand::thread_rng().gen_range(0..range_nanos))
}
