//! Query deadlines for the PostgreSQL ledger store.
//!
//! Reads outside a unit of work are bounded so a stalled database surfaces as
//! an internal error instead of hanging a connection's reader.

use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

use super::errors::{LedgerError, LedgerResult};

/// Default timeout for single queries (5 seconds)
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Default timeout for acquiring a transaction (10 seconds)
pub const DEFAULT_TRANSACTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Run a database future, failing with `LedgerError::Timeout` after `duration`
///
/// # Example
///
/// ```no_run
/// use spicy_dice::db::timeouts::{with_timeout, DEFAULT_QUERY_TIMEOUT};
/// # use sqlx::PgPool;
/// # async fn example(pool: &PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let row = with_timeout(
///     DEFAULT_QUERY_TIMEOUT,
///     sqlx::query("SELECT balance FROM player WHERE id = $1")
///         .bind(1_i64)
///         .fetch_optional(pool),
/// )
/// .await?;
/// # Ok(())
/// # }
/// ```
pub async fn with_timeout<F, T>(duration: Duration, future: F) -> LedgerResult<T>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match timeout(duration, future).await {
        Ok(result) => result.map_err(LedgerError::from),
        Err(_) => Err(LedgerError::Timeout(duration)),
    }
}

/// Run a database future with [`DEFAULT_QUERY_TIMEOUT`]
pub async fn with_default_timeout<F, T>(future: F) -> LedgerResult<T>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    with_timeout(DEFAULT_QUERY_TIMEOUT, future).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_timeout_fires() {
        let slow = async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok::<_, sqlx::Error>(1)
        };
        let result = with_timeout(Duration::from_millis(10), slow).await;
        assert!(matches!(result, Err(LedgerError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_fast_future_passes_through() {
        let result = with_default_timeout(async { Ok::<_, sqlx::Error>(5) }).await;
        assert_eq!(result.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_database_error_wrapped() {
        let result =
            with_default_timeout(async { Err::<(), _>(sqlx::Error::RowNotFound) }).await;
        assert!(matches!(result, Err(LedgerError::Database(_))));
    }

    #[test]
    fn test_timeout_error_display() {
        let err = LedgerError::Timeout(Duration::from_secs(5));
        assert!(err.to_string().contains("timed out"));
        assert!(err.to_string().contains("5s"));
    }
}
