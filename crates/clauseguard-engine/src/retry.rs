//! Bounded retry with exponential backoff
//!
//! Only transient failures (timeout, rate-limit, 5xx-equivalent) are
//! retried; malformed responses and auth failures return immediately so the
//! caller can fall back. The schedule is bounded — exhausting it returns the
//! last error.

use clauseguard_llm::provider::{LlmError, LlmResult};
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::warn;

/// Run `op`, retrying transient errors after each delay in `backoff_ms`.
pub async fn with_backoff<T, F, Fut>(backoff_ms: &[u64], op_name: &str, mut op: F) -> LlmResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = LlmResult<T>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < backoff_ms.len() => {
                let delay = backoff_ms[attempt];
                attempt += 1;
                warn!(
                    "Transient error on {} (attempt {}), retrying in {}ms: {}",
                    op_name, attempt, delay, e
                );
                sleep(Duration::from_millis(delay)).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Apply a per-call deadline, mapping elapse to a transient timeout error.
pub async fn with_deadline<T, Fut>(secs: u64, service: &str, fut: Fut) -> LlmResult<T>
where
    Fut: Future<Output = LlmResult<T>>,
{
    match timeout(Duration::from_secs(secs), fut).await {
        Ok(result) => result,
        Err(_) => Err(LlmError::Timeout {
            service: service.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn transient_errors_retry_until_success() {
        let calls = AtomicUsize::new(0);
        let result = with_backoff(&[1, 1, 1], "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(LlmError::ServiceUnavailable("503".into()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_transient_fails_immediately() {
        let calls = AtomicUsize::new(0);
        let result: LlmResult<i32> = with_backoff(&[1, 1, 1], "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(LlmError::InvalidResponse("not json".into())) }
        })
        .await;
        assert!(matches!(result, Err(LlmError::InvalidResponse(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1, "malformed output is never retried");
    }

    #[tokio::test]
    async fn schedule_exhaustion_returns_last_error() {
        let calls = AtomicUsize::new(0);
        let result: LlmResult<i32> = with_backoff(&[1, 1], "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(LlmError::Timeout { service: "llm".into() }) }
        })
        .await;
        assert!(matches!(result, Err(LlmError::Timeout { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3, "initial attempt plus two retries");
    }

    #[tokio::test]
    async fn deadline_maps_to_timeout_error() {
        let result: LlmResult<i32> = with_deadline(0, "embedding", async {
            sleep(Duration::from_millis(50)).await;
            Ok(1)
        })
        .await;
        match result {
            Err(LlmError::Timeout { service }) => assert_eq!(service, "embedding"),
            other => panic!("expected timeout, got {other:?}"),
        }
    }
}
