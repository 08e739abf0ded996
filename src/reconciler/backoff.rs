//! Bounded exponential backoff with an injectable clock.

use crate::error::Result;
use async_trait::async_trait;
use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::warn;

/// Delay before the first retry.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(5);

/// Time after which retrying stops.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(60);

/// Source of time for retry loops.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Clock that only moves when slept on. Records every sleep.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
    sleeps: Mutex<Vec<Duration>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    /// Move time forward without sleeping.
    pub fn advance(&self, duration: Duration) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) += duration;
    }

    /// Every duration slept so far, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(duration);
        self.advance(duration);
    }
}

/// Retry policy: delays grow by `multiplier` from `initial` and retrying stops
/// once the next delay would end past `deadline`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub initial: Duration,
    pub deadline: Duration,
    pub multiplier: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(DEFAULT_INITIAL_DELAY, DEFAULT_DEADLINE)
    }
}

impl Backoff {
    pub fn new(initial: Duration, deadline: Duration) -> Self {
        Self {
            initial,
            deadline,
            multiplier: 2,
        }
    }

    pub fn with_multiplier(mut self, multiplier: u32) -> Self {
        self.multiplier = multiplier.max(1);
        self
    }

    /// Delay before the retry following `attempt` failures, or `None` when it
    /// would overrun the deadline.
    pub fn delay(&self, attempt: u32, elapsed: Duration) -> Option<Duration> {
        let delay = self
            .initial
            .checked_mul(self.multiplier.checked_pow(attempt.saturating_sub(1))?)?;
        (elapsed + delay <= self.deadline).then_some(delay)
    }

    /// Run `op` until it succeeds or the deadline is reached, returning the
    /// last error in the latter case.
    pub async fn retry<T, F, Fut>(&self, clock: &dyn Clock, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let started = clock.now();
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            let elapsed = clock.now().saturating_duration_since(started);
            let Some(delay) = self.delay(attempt, elapsed) else {
                return Err(err);
            };
            warn!(%what, attempt, retry_in = ?delay, error = %err, "attempt failed, retrying");
            clock.sleep(delay).await;
        }
    }
}
