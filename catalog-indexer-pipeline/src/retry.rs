//! Retry with a fixed delay, bounded by cancellation instead of attempts.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::cancellation::CancellationToken;

/// Default delay between two attempts on the import path.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1000);

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// `token` is cancelled.
///
/// The token is checked before every further attempt and also interrupts
/// the delay. On cancellation the last error is returned.
pub async fn retry_until_cancelled<T, E, F, Fut>(
    token: &CancellationToken,
    delay: Duration,
    is_retryable: impl Fn(&E) -> bool,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt: u32 = 1;

    loop {
        let error = match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        if !is_retryable(&error) || token.is_cancelled() {
            return Err(error);
        }

        warn!(
            error = %error,
            attempt = attempt,
            delay_ms = delay.as_millis() as u64,
            "Operation failed, retrying"
        );

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = token.cancelled() => return Err(error),
        }

        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, PartialEq)]
    enum TestError {
        Transient,
        Fatal,
    }

    impl Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{:?}", self)
        }
    }

    fn transient(error: &TestError) -> bool {
        *error == TestError::Transient
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success() {
        let token = CancellationToken::new();
        let counter = AtomicUsize::new(0);
        let attempts = &counter;

        let result = retry_until_cancelled(&token, DEFAULT_RETRY_DELAY, transient, move || async move {
            if attempts.fetch_add(1, Ordering::SeqCst) < 3 {
                Err(TestError::Transient)
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result, Ok(7));
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_is_not_retried() {
        let token = CancellationToken::new();
        let counter = AtomicUsize::new(0);
        let attempts = &counter;

        let result: Result<(), _> =
            retry_until_cancelled(&token, DEFAULT_RETRY_DELAY, transient, move || async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(TestError::Fatal)
            })
            .await;

        assert_eq!(result, Err(TestError::Fatal));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_retrying() {
        let token = CancellationToken::new();
        let counter = AtomicUsize::new(0);
        let attempts = &counter;

        let canceller = {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(2500)).await;
                token.cancel();
            })
        };

        let result: Result<(), _> =
            retry_until_cancelled(&token, DEFAULT_RETRY_DELAY, transient, move || async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(TestError::Transient)
            })
            .await;

        canceller.await.unwrap();
        assert_eq!(result, Err(TestError::Transient));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
