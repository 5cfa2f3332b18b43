//! Deadline enforcement for store operations.

use std::future::Future;
use std::time::Duration;

use crate::{EventStoreError, Result};

/// Runs `fut`, abandoning it once `after` has elapsed.
///
/// Dropping the future drops any open transaction with it, which rolls the
/// transaction back when its connection returns to the pool.
pub async fn with_deadline<T, F>(operation: &'static str, after: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(operation, ?after, "deadline exceeded");
            Err(EventStoreError::Timeout { operation, after })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completes_within_deadline() {
        let value = with_deadline("fast", Duration::from_secs(1), async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn passes_through_inner_error() {
        let result: Result<()> = with_deadline("failing", Duration::from_secs(1), async {
            Err(EventStoreError::Execute(sqlx::Error::RowNotFound))
        })
        .await;
        assert!(matches!(result, Err(EventStoreError::Execute(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_slow_future() {
        let result: Result<()> = with_deadline("slow", Duration::from_millis(50), async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        })
        .await;
        match result {
            Err(EventStoreError::Timeout { operation, after }) => {
                assert_eq!(operation, "slow");
                assert_eq!(after, Duration::from_millis(50));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }
}
