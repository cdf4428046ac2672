//! Exponential backoff with jitter over flaky transports. The delay before
//! retry `a` (0-indexed) is `min(base * 2^a, max) + Uniform[0, 0.5 * min(base
//! * 2^a, max)]`; the on-retry callback fires before the sleep so the
//! presenter can show a live attempt counter.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

#[derive(Debug, Clone)]
pub struct RetryOptions {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryOptions {
    fn default() -> Self {
        RetryOptions {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
        }
    }
}

/// Published to the presenter on every retry callback.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryStatus {
    pub is_retrying: bool,
    pub attempt: u32,
    pub max_attempts: u32,
    pub last_error: String,
}

/// Backoff before the retry that follows failed attempt `attempt`
/// (0-indexed), jitter included.
pub fn backoff_delay(attempt: u32, options: &RetryOptions) -> Duration {
    let exponential = options
        .base_delay
        .saturating_mul(2u32.saturating_pow(attempt));
    let capped = exponential.min(options.max_delay);
    let jitter = capped.mul_f64(rand::thread_rng().gen_range(0.0..0.5));
    capped + jitter
}

/// Runs `op` up to `options.max_attempts` times. An error is retried only
/// when `should_retry` approves it and attempts remain; `on_retry` receives
/// `(attempt + 1, max_attempts, &error)` before each backoff sleep.
pub async fn with_retry<T, E, F, Fut, S, C>(
    mut op: F,
    options: &RetryOptions,
    should_retry: S,
    mut on_retry: C,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    S: Fn(&E) -> bool,
    C: FnMut(u32, u32, &E),
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let is_last = attempt + 1 >= options.max_attempts;
                if is_last || !should_retry(&err) {
                    return Err(err);
                }
                tracing::warn!(
                    attempt = attempt + 1,
                    max_attempts = options.max_attempts,
                    error = %err,
                    "operation failed, backing off before retry"
                );
                on_retry(attempt + 1, options.max_attempts, &err);
                tokio::time::sleep(backoff_delay(attempt, options)).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::ClientError;
    use std::sync::Mutex;

    #[test]
    fn backoff_stays_within_bounds() {
        let options = RetryOptions {
            max_attempts: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1000),
        };
        for attempt in 0..8 {
            let exponential =
                Duration::from_millis(100).saturating_mul(2u32.saturating_pow(attempt));
            let capped = exponential.min(options.max_delay);
            for _ in 0..50 {
                let delay = backoff_delay(attempt, &options);
                assert!(delay >= capped, "attempt {attempt}: {delay:?} < {capped:?}");
                assert!(
                    delay <= capped.mul_f64(1.5),
                    "attempt {attempt}: {delay:?} > 1.5x {capped:?}"
                );
            }
        }
    }

    /// A scripted sequence of failures: connection reset, 503, 404, timeout,
    /// 500. With three attempts, the first two errors are retried and the
    /// 404 aborts; the tail of the script is never reached.
    #[tokio::test(start_paused = true)]
    async fn classification_stops_on_application_error() {
        let script = Mutex::new(vec![
            ClientError::Transport("ECONNRESET".into()),
            ClientError::Http {
                status: 503,
                message: "unavailable".into(),
            },
            ClientError::Http {
                status: 404,
                message: "not found".into(),
            },
            ClientError::RequestTimedOut,
            ClientError::Http {
                status: 500,
                message: "boom".into(),
            },
        ]);
        let calls = Mutex::new(0u32);
        let retries = Mutex::new(Vec::new());

        let result: Result<(), ClientError> = with_retry(
            || {
                *calls.lock().unwrap() += 1;
                let err = script.lock().unwrap().remove(0);
                async move { Err(err) }
            },
            &RetryOptions::default(),
            ClientError::is_retryable,
            |attempt, max, _err| retries.lock().unwrap().push((attempt, max)),
        )
        .await;

        match result {
            Err(ClientError::Http { status: 404, .. }) => {}
            other => panic!("expected the 404 to surface, got {other:?}"),
        }
        assert_eq!(*calls.lock().unwrap(), 3, "remaining script never sent");
        assert_eq!(*retries.lock().unwrap(), vec![(1, 3), (2, 3)]);
    }

    #[tokio::test(start_paused = true)]
    async fn last_attempt_error_surfaces_even_if_retryable() {
        let calls = Mutex::new(0u32);
        let result: Result<(), ClientError> = with_retry(
            || {
                *calls.lock().unwrap() += 1;
                async { Err(ClientError::RequestTimedOut) }
            },
            &RetryOptions::default(),
            ClientError::is_retryable,
            |_, _, _| {},
        )
        .await;
        assert!(matches!(result, Err(ClientError::RequestTimedOut)));
        assert_eq!(*calls.lock().unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn success_after_retries() {
        let calls = Mutex::new(0u32);
        let result: Result<u32, ClientError> = with_retry(
            || {
                let n = {
                    let mut guard = calls.lock().unwrap();
                    *guard += 1;
                    *guard
                };
                async move {
                    if n < 3 {
                        Err(ClientError::Transport("connection refused".into()))
                    } else {
                        Ok(n)
                    }
                }
            },
            &RetryOptions::default(),
            ClientError::is_retryable,
            |_, _, _| {},
        )
        .await;
        assert_eq!(result.unwrap(), 3);
    }
}
