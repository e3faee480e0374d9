// Retry strategy with capped exponential backoff
//
// Delay after the Nth consecutive failure (N starting at 0):
//   min(cap, base * 2^N)
// No jitter, matching the redis client backoff used by the hosted console.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Default number of retries after the first failed attempt
pub const DEFAULT_RETRIES: u32 = 5;

/// Retry strategy trait for calculating retry delays
pub trait RetryStrategy: Send + Sync {
    /// Calculate the delay before the next retry attempt
    /// Returns None if max retries exceeded
    fn next_delay(&self, attempt: u32) -> Option<Duration>;

    /// Check if more retries are allowed
    fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries()
    }

    /// Get the maximum number of retries
    fn max_retries(&self) -> u32;
}

/// Exponential backoff bounded by a cap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExponentialBackoff {
    base: Duration,
    cap: Duration,
    retries: u32,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(100),
            cap: Duration::from_secs(2),
            retries: DEFAULT_RETRIES,
        }
    }
}

impl ExponentialBackoff {
    /// Create a new exponential backoff strategy with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new exponential backoff strategy with custom values
    pub fn with_config(base: Duration, cap: Duration, retries: u32) -> Self {
        Self {
            base,
            cap: cap.max(base),
            retries,
        }
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    pub fn cap(&self) -> Duration {
        self.cap
    }

    /// Delay without the retry limit applied
    fn calculate_delay(&self, attempt: u32) -> Duration {
        // 2^attempt overflows quickly; anything past 31 doublings is over the cap anyway
        let factor = 1u32.checked_shl(attempt.min(31)).unwrap_or(u32::MAX);
        self.base
            .checked_mul(factor)
            .map_or(self.cap, |delay| delay.min(self.cap))
    }
}

impl RetryStrategy for ExponentialBackoff {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.retries {
            return None;
        }
        Some(self.calculate_delay(attempt))
    }

    fn max_retries(&self) -> u32 {
        self.retries
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or the
/// strategy runs out of retries.
///
/// `retryable` decides whether an error is worth another attempt.
pub async fn retry_async<S, T, E, Op, Fut, P>(
    strategy: &S,
    mut operation: Op,
    retryable: P,
) -> Result<T, E>
where
    S: RetryStrategy + ?Sized,
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if retryable(&e) && strategy.should_retry(attempt) => {
                match strategy.next_delay(attempt) {
                    Some(delay) => {
                        warn!(
                            attempt = attempt + 1,
                            max_retries = strategy.max_retries(),
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "Retrying after transient failure"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => return Err(e),
                }
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_exponential_backoff_sequence() {
        let strategy = ExponentialBackoff::new();

        assert_eq!(strategy.next_delay(0), Some(Duration::from_millis(100)));
        assert_eq!(strategy.next_delay(1), Some(Duration::from_millis(200)));
        assert_eq!(strategy.next_delay(2), Some(Duration::from_millis(400)));
        assert_eq!(strategy.next_delay(3), Some(Duration::from_millis(800)));
        assert_eq!(strategy.next_delay(4), Some(Duration::from_millis(1600)));
        assert_eq!(strategy.next_delay(5), None);
    }

    #[test]
    fn test_cap_applies() {
        let strategy =
            ExponentialBackoff::with_config(Duration::from_millis(100), Duration::from_secs(2), 10);

        assert_eq!(strategy.next_delay(5), Some(Duration::from_secs(2)));
        assert_eq!(strategy.next_delay(9), Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_huge_attempt_does_not_overflow() {
        let strategy = ExponentialBackoff::with_config(
            Duration::from_secs(1),
            Duration::from_secs(30),
            u32::MAX,
        );
        assert_eq!(strategy.next_delay(200), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_retry_limit_enforcement() {
        let strategy = ExponentialBackoff::new();

        for attempt in 0..DEFAULT_RETRIES {
            assert!(strategy.should_retry(attempt));
        }
        assert!(!strategy.should_retry(DEFAULT_RETRIES));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_async_recovers_from_transient_errors() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let strategy = ExponentialBackoff::new();

        let result: Result<&str, String> = retry_async(
            &strategy,
            move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err("timeout".to_string())
                } else {
                    Ok("PONG")
                }
            },
            |_| true,
        )
        .await;

        assert_eq!(result, Ok("PONG"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_async_gives_up_after_limit() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let strategy = ExponentialBackoff::new();

        let result: Result<(), String> = retry_async(
            &strategy,
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("timeout".to_string())
            },
            |_| true,
        )
        .await;

        assert!(result.is_err());
        // First attempt plus five retries
        assert_eq!(calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_retry_async_stops_on_permanent_error() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let strategy = ExponentialBackoff::new();

        let result: Result<(), String> = retry_async(
            &strategy,
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("WRONGPASS".to_string())
            },
            |e| e.contains("timeout"),
        )
        .await;

        assert_eq!(result, Err("WRONGPASS".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    /// Allows one retry, but would hand out delays forever
    struct OneRetry;

    impl RetryStrategy for OneRetry {
        fn next_delay(&self, _attempt: u32) -> Option<Duration> {
            Some(Duration::from_millis(1))
        }

        fn max_retries(&self) -> u32 {
            1
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_async_honors_should_retry() {
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result: Result<(), String> = retry_async(
            &OneRetry,
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("timeout".to_string())
            },
            |_| true,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
