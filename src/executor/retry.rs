use std::future::Future;
use std::time::Duration;

/// Retry a fallible async operation with exponential backoff.
pub async fn with_retry<F, Fut, T, E>(
    max_retries: u32,
    base_delay_ms: u64,
    operation_name: &str,
    f: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    with_retry_when(max_retries, base_delay_ms, operation_name, |_| true, f).await
}

/// Like [`with_retry`], but only errors accepted by `should_retry` are
/// retried. Anything else is returned immediately.
pub async fn with_retry_when<F, Fut, T, E, P>(
    max_retries: u32,
    base_delay_ms: u64,
    operation_name: &str,
    should_retry: P,
    mut f: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0;

    loop {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) if !should_retry(&e) => return Err(e),
            Err(e) => {
                attempt += 1;
                if attempt > max_retries {
                    tracing::error!(
                        operation = operation_name,
                        attempts = attempt,
                        "All retry attempts exhausted"
                    );
                    return Err(e);
                }

                let delay = Duration::from_millis(base_delay_ms * 2u64.pow(attempt - 1));
                tracing::warn!(
                    operation = operation_name,
                    attempt = attempt,
                    max_retries = max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Retrying after failure"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_retries_until_success() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = with_retry(3, 1, "flaky", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(format!("attempt {} failed", n))
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let result: Result<(), String> = with_retry(2, 1, "broken", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("nope".to_string()) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), u16> = with_retry_when(
            5,
            1,
            "rejected",
            |code| *code >= 500,
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(422) }
            },
        )
        .await;
        assert_eq!(result.unwrap_err(), 422);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
