use std::future::Future;
use std::time::Duration;

use rand::Rng;

/// Bounded exponential backoff with jitter, used for HTTP 5xx/429 retries
/// against the vector store (§4.1: "HTTP 5xx and 429 are retried with
/// bounded exponential backoff (≤ 3 attempts, jitter)").
///
/// `should_retry` classifies the error; non-retryable errors (network,
/// 4xx != 429, schema errors) return immediately without consuming an
/// attempt's delay.
pub async fn retry_with_backoff<T, E, F, Fut>(
    max_attempts: u32,
    base_delay: Duration,
    mut should_retry: impl FnMut(&E) -> bool,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) => {
                attempt += 1;
                if attempt >= max_attempts || !should_retry(&e) {
                    return Err(e);
                }
                let backoff = base_delay * 2u32.pow(attempt - 1);
                let jitter_ms = rand::thread_rng().gen_range(0..100);
                tokio::time::sleep(backoff + Duration::from_millis(jitter_ms)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_until_success() {
        let attempts = AtomicU32::new(0);
        let result: Result<u32, &str> = retry_with_backoff(
            3,
            Duration::from_millis(1),
            |_: &&str| true,
            || {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err("transient")
                    } else {
                        Ok(42)
                    }
                }
            },
        )
        .await;
        assert_eq!(result, Ok(42));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let attempts = AtomicU32::new(0);
        let result: Result<u32, &str> = retry_with_backoff(
            3,
            Duration::from_millis(1),
            |_: &&str| true,
            || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err::<u32, &str>("always fails") }
            },
        )
        .await;
        assert_eq!(result, Err("always fails"));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_returns_immediately() {
        let attempts = AtomicU32::new(0);
        let result: Result<u32, &str> = retry_with_backoff(
            3,
            Duration::from_millis(1),
            |_: &&str| false,
            || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err::<u32, &str>("not found") }
            },
        )
        .await;
        assert_eq!(result, Err("not found"));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
