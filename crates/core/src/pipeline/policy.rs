//! Retry and shutdown-aware sleeping shared by the loops.

use std::future::Future;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::warn;

use super::config::RetryPolicy;

/// Run `op` until it succeeds or `policy.max_attempts` attempts have failed.
///
/// Returns the last error when every attempt fails. A policy with zero
/// attempts still runs `op` once.
pub async fn retry_async<T, E, F, Fut>(policy: &RetryPolicy, operation: &str, op: F) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_attempts => {
                warn!(
                    operation,
                    attempt,
                    max_attempts,
                    error = %e,
                    "Attempt failed, retrying in {:?}",
                    policy.delay
                );
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Sleep for `duration` unless shutdown is signalled first.
///
/// Returns `false` when the loop should stop.
pub async fn sleep_or_shutdown(duration: Duration, shutdown: &mut broadcast::Receiver<()>) -> bool {
    if duration.is_zero() {
        return !shutdown_pending(shutdown);
    }
    tokio::select! {
        _ = shutdown.recv() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

fn shutdown_pending(shutdown: &mut broadcast::Receiver<()>) -> bool {
    use broadcast::error::TryRecvError;
    !matches!(shutdown.try_recv(), Err(TryRecvError::Empty))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_retry_succeeds_after_failures() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(1));

        let result: Result<u32, String> = retry_async(&policy, "flaky", || async {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                Err(format!("fail {}", n))
            } else {
                Ok(n)
            }
        })
        .await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_returns_last_error() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(2, Duration::from_millis(1));

        let result: Result<(), String> = retry_async(&policy, "broken", || async {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            Err(format!("fail {}", n))
        })
        .await;

        assert_eq!(result, Err("fail 2".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_zero_attempts_runs_once() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(0, Duration::ZERO);

        let result: Result<(), &str> = retry_async(&policy, "once", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err("nope")
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_sleep_interrupted_by_shutdown() {
        let (tx, mut rx) = broadcast::channel(1);
        tx.send(()).unwrap();
        assert!(!sleep_or_shutdown(Duration::from_secs(60), &mut rx).await);
    }

    #[tokio::test]
    async fn test_sleep_completes() {
        let (_tx, mut rx) = broadcast::channel::<()>(1);
        assert!(sleep_or_shutdown(Duration::from_millis(1), &mut rx).await);
        assert!(sleep_or_shutdown(Duration::ZERO, &mut rx).await);
    }
}
