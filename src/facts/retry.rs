//! Retry policies for the API clients.
//!
//! Two distinct kinds of waiting happen while talking to the external APIs:
//!
//! - [`RateLimitPolicy`]: the server told us our quota is exhausted and when it resets. This is an
//!   expected condition. The request is re-issued after the wait and the wait does not count
//!   against the retry budget.
//! - [`BackoffPolicy`]: the request failed at the transport level (connection refused, timeout,
//!   truncated body). These are anomalies with a bounded budget and exponentially growing delays.
//!
//! [`retry_transient`] applies the backoff policy around a single attempt. Clients put their
//! rate-limit loop inside the attempt so that rate-limit waits never consume attempts.
//!
//! All waiting goes through a [`Clock`] so the policies can be exercised without real sleeps.

use chrono::{DateTime, Utc};
use core::fmt::Debug;
use core::time::Duration;
use futures::future::BoxFuture;
use ohno::EnrichableExt;
use tokio_util::sync::CancellationToken;

/// Source of the current time and of sleeps.
pub trait Clock: Debug + Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()>;
}

/// Wall-clock time and tokio timers.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Outcome of a failed attempt, as seen by [`retry_transient`].
#[derive(Debug)]
pub enum AttemptError {
    /// Transport-level failure; worth another attempt.
    Transient(ohno::AppError),

    /// Anything else; surfaced immediately.
    Permanent(ohno::AppError),
}

impl From<reqwest::Error> for AttemptError {
    fn from(e: reqwest::Error) -> Self {
        // A status error means the server answered; only transport problems are retried.
        if e.is_status() || e.is_builder() || e.is_decode() {
            Self::Permanent(e.into())
        } else {
            Self::Transient(e.into())
        }
    }
}

/// Exponential backoff between attempts that failed at the transport level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    /// Total number of attempts, including the first one. Never less than 1.
    max_attempts: u32,
    base: f64,
}

impl BackoffPolicy {
    #[must_use]
    pub const fn new(max_attempts: u32, base: f64) -> Self {
        Self {
            max_attempts: if max_attempts == 0 { 1 } else { max_attempts },
            base,
        }
    }

    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay to wait after `attempt` (numbered from 1) failed, or `None` when the budget is spent.
    ///
    /// The delay is `base ^ attempt` seconds.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }

        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.base.powi(exponent);
        Some(Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX))
    }
}

/// Rate-limit information from API response headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub remaining: u64,

    /// Epoch seconds at which the quota resets, when the server said so.
    pub reset_epoch: Option<i64>,
}

/// How long to wait when the server reports an exhausted quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    min_wait: Duration,
    max_wait: Duration,
    max_waits: Option<u32>,
}

impl RateLimitPolicy {
    /// Shortest wait, used when the reset time is missing or already in the past.
    pub const MIN_WAIT: Duration = Duration::from_secs(5);

    #[must_use]
    pub const fn new(max_wait: Duration, max_waits: Option<u32>) -> Self {
        Self {
            min_wait: Self::MIN_WAIT,
            max_wait,
            max_waits,
        }
    }

    /// Wait until one second past the reset time, at least [`Self::MIN_WAIT`] and at most the configured cap.
    #[must_use]
    pub fn wait_for(&self, info: &RateLimitInfo, now: DateTime<Utc>) -> Duration {
        let reset = info.reset_epoch.unwrap_or(0);
        let min_secs = i64::try_from(self.min_wait.as_secs()).unwrap_or(i64::MAX);
        let secs = reset.saturating_sub(now.timestamp()).saturating_add(1).max(min_secs);
        let wait = u64::try_from(secs).map_or(self.min_wait, Duration::from_secs);
        wait.min(self.max_wait)
    }

    /// Whether another wait is allowed after `waits_so_far` consecutive waits for the same request.
    #[must_use]
    pub fn allows_wait(&self, waits_so_far: u32) -> bool {
        self.max_waits.is_none_or(|max| waits_so_far < max)
    }
}

/// Sleep for `duration`, returning early with an error if `cancel` fires first.
pub async fn pause(clock: &dyn Clock, duration: Duration, cancel: Option<&CancellationToken>) -> Result<(), AttemptError> {
    let Some(token) = cancel else {
        clock.sleep(duration).await;
        return Ok(());
    };

    tokio::select! {
        () = token.cancelled() => Err(AttemptError::Permanent(ohno::app_err!("cancelled while waiting for the rate limit to reset"))),
        () = clock.sleep(duration) => Ok(()),
    }
}

/// Run `attempt` until it succeeds, backing off between transient failures.
///
/// Permanent failures and the final transient failure are returned as-is, enriched with `what`.
pub async fn retry_transient<T, F, Fut>(policy: &BackoffPolicy, clock: &dyn Clock, what: &str, mut attempt: F) -> crate::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AttemptError>>,
{
    let mut attempt_number = 1;
    loop {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(AttemptError::Permanent(e)) => return Err(e.enrich_with(|| what.to_string())),
            Err(AttemptError::Transient(e)) => {
                let Some(delay) = policy.delay_after(attempt_number) else {
                    return Err(e.enrich_with(|| format!("{what} (gave up after {attempt_number} attempt(s))")));
                };

                log::debug!(
                    "{what}: attempt {attempt_number} failed, retrying in {}ms: {e:#}",
                    delay.as_millis()
                );

                clock.sleep(delay).await;
                attempt_number += 1;
            }
        }
    }
}
