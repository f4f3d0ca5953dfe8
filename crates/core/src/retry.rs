//! Bounded retry for remote write operations.

use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::RetrySettings;
use crate::error::EngineError;

/// True when the underlying chain rejected a transaction because the
/// account's sequence number was stale.
fn is_nonce_error(err: &anyhow::Error) -> bool {
    let text = format!("{err:#}").to_lowercase();
    text.contains("nonce") || text.contains("sequence number")
}

/// Run `op` up to `max_attempts + 1` times: the first attempt is
/// unconditional, each retry is preceded by a flat delay.
///
/// The closure is re-invoked from scratch on every attempt, so state the
/// operation fetches (in particular the account nonce) is fresh each
/// time; stale-nonce rejections are logged distinctly but retried like
/// any other failure. Once attempts are exhausted the last error is
/// returned as [`EngineError::OperationFailed`].
///
/// Only remote writes (transfers, swap approvals/executions, staking
/// delegations) go through this path; read-only queries are not retried.
pub async fn with_retry<T, F, Fut>(
    settings: &RetrySettings,
    operation: &str,
    op: F,
) -> Result<T, EngineError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let total_attempts = settings.max_attempts + 1;
    let mut last_error: Option<anyhow::Error> = None;

    for attempt in 1..=total_attempts {
        if attempt > 1 {
            tokio::time::sleep(Duration::from_secs(settings.delay_secs)).await;
        }

        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    info!(operation, attempt, "remote operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => {
                if is_nonce_error(&err) {
                    warn!(
                        operation,
                        attempt,
                        error = %err,
                        "chain rejected stale nonce; sequence number will be refetched on retry"
                    );
                } else {
                    warn!(operation, attempt, error = %err, "remote operation failed");
                }
                last_error = Some(err);
            }
        }
    }

    Err(EngineError::OperationFailed {
        attempts: total_attempts,
        message: last_error
            .map(|e| format!("{e:#}"))
            .unwrap_or_else(|| "unknown failure".to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn settings(max_attempts: u32) -> RetrySettings {
        RetrySettings {
            max_attempts,
            delay_secs: 2,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn first_success_returns_immediately() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&settings(3), "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, anyhow::Error>(42)
        })
        .await
        .unwrap();
        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_success() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&settings(3), "test", || async {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                Err(anyhow!("transient failure"))
            } else {
                Ok(n)
            }
        })
        .await
        .unwrap();
        assert_eq!(result, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_reports_attempt_count_and_last_error() {
        let calls = AtomicU32::new(0);
        let err = with_retry(&settings(3), "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(anyhow!("rpc unreachable"))
        })
        .await
        .unwrap_err();

        // max_attempts = 3 means at most 4 invocations
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        match err {
            EngineError::OperationFailed { attempts, message } => {
                assert_eq!(attempts, 4);
                assert!(message.contains("rpc unreachable"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn nonce_failures_are_still_retried() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&settings(3), "test", || async {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n == 1 {
                Err(anyhow!("tx rejected: nonce too low"))
            } else {
                Ok("0xabc")
            }
        })
        .await
        .unwrap();
        assert_eq!(result, "0xabc");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_max_attempts_means_single_try() {
        let calls = AtomicU32::new(0);
        let err = with_retry(&settings(0), "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(anyhow!("boom"))
        })
        .await
        .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(err, EngineError::OperationFailed { attempts: 1, .. }));
    }
}
