//! # Retry Policy
//!
//! Bounded exponential backoff around a single-attempt future.
//!
//! ## Timing (base = 1s, max_attempts = 3)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  attempt 1 ──✗── sleep 2s ── attempt 2 ──✗── sleep 4s ── attempt 3 ──✗ │
//! │                                                                    │    │
//! │                                                     Exhausted { attempts: 3 }
//! │                                                                         │
//! │  wait after attempt k = base × 2^k, no jitter                          │
//! │  any Ok(..) ends the loop at once                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Only `Err` is retried. Callers return `Ok` for outcomes that must not be
//! repeated (an authority rejection, for one).

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Longest single wait, whatever the attempt count.
const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// How many times to try and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts in total, first one included. At least 1.
    pub max_attempts: u32,
    pub base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::new(3, Duration::from_secs(1))
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base: Duration) -> Self {
        RetryPolicy {
            max_attempts: max_attempts.max(1),
            base,
        }
    }

    /// A fresh backoff whose first interval is `base × 2`.
    pub fn backoff(&self) -> ExponentialBackoff {
        let first = self.base.saturating_mul(2);
        ExponentialBackoff {
            current_interval: first,
            initial_interval: first,
            multiplier: 2.0,
            randomization_factor: 0.0,
            max_interval: MAX_BACKOFF,
            max_elapsed_time: None,
            ..Default::default()
        }
    }

    /// The waits a call that fails every attempt goes through.
    pub fn delays(&self) -> Vec<Duration> {
        let mut backoff = self.backoff();
        (1..self.max_attempts)
            .filter_map(|_| backoff.next_backoff())
            .collect()
    }
}

/// Every attempt failed.
#[derive(Debug)]
pub struct Exhausted<E> {
    /// The last attempt's error.
    pub error: E,
    pub attempts: u32,
}

impl<E: fmt::Display> fmt::Display for Exhausted<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (after {} attempt(s))", self.error, self.attempts)
    }
}

/// Runs `attempt` until it returns `Ok` or the policy runs out.
///
/// `attempt` receives the 1-based attempt number. Waits use
/// `tokio::time::sleep`, so only the calling task is held up.
///
/// ## Example
/// ```rust,ignore
/// let body = with_retry(&policy, |n| async move {
///     debug!(attempt = n, "Sending");
///     client.post(url).send().await
/// })
/// .await?;
/// ```
pub async fn with_retry<T, E, F, Fut>(policy: &RetryPolicy, mut attempt: F) -> Result<T, Exhausted<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let mut backoff = policy.backoff();
    let mut n = 1;

    loop {
        let error = match attempt(n).await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        if n >= policy.max_attempts {
            return Err(Exhausted { error, attempts: n });
        }

        let Some(delay) = backoff.next_backoff() else {
            return Err(Exhausted { error, attempts: n });
        };

        warn!(
            attempt = n,
            max_attempts = policy.max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Attempt failed, backing off"
        );
        tokio::time::sleep(delay).await;
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    #[test]
    fn test_delays_double_from_twice_the_base() {
        let policy = RetryPolicy::new(4, Duration::from_secs(1));
        assert_eq!(
            policy.delays(),
            vec![
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8)
            ]
        );
    }

    #[test]
    fn test_delays_strictly_increase() {
        let delays = RetryPolicy::new(6, Duration::from_millis(250)).delays();
        assert_eq!(delays.len(), 5);
        assert!(delays.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_at_least_one_attempt() {
        let policy = RetryPolicy::new(0, Duration::from_secs(1));
        assert_eq!(policy.max_attempts, 1);
        assert!(policy.delays().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let started = Instant::now();

        let result: Result<(), _> = with_retry(&RetryPolicy::default(), |_| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("connection refused")
            }
        })
        .await;

        let exhausted = result.unwrap_err();
        assert_eq!(exhausted.attempts, 3);
        assert_eq!(exhausted.error, "connection refused");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 2s + 4s of paused time
        assert_eq!(started.elapsed().as_secs(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_on_first_success() {
        let result = with_retry(&RetryPolicy::default(), |n| async move {
            if n < 2 {
                Err(format!("attempt {n} timed out"))
            } else {
                Ok(n)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ok_is_never_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<&str, Exhausted<String>> = with_retry(&RetryPolicy::default(), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok("rejected, but delivered") }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
