//! Reference SQL backend: a single Postgres table and one atomic claim
//! statement built around `FOR UPDATE SKIP LOCKED`.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::errors::{RepositoryError, RepositoryResult};
use crate::models::{MessageStatus, OutboxMessage};
use crate::repository::traits::OutboxRepository;
use crate::utils::database_retry::{with_retry, RetryConfig};

pub struct PostgresOutboxRepository {
    pool: Pool<Postgres>,
    write_retry: RetryConfig,
}

impl PostgresOutboxRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            pool,
            write_retry: RetryConfig::for_writes(),
        }
    }

    /// Like [`with_retry`], but stops retrying as soon as `cancel` fires,
    /// surfacing whatever error the last attempt produced instead of
    /// sleeping through a shutdown.
    async fn with_cancellable_retry<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        operation_name: &str,
        mut operation: F,
    ) -> RepositoryResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = RepositoryResult<T>>,
    {
        if cancel.is_cancelled() {
            debug!(operation = operation_name, "skipped: already cancelled");
        }
        let result = with_retry(&self.write_retry, &mut operation, operation_name).await;
        if cancel.is_cancelled() {
            warn!(
                operation = operation_name,
                "cancellation observed during retry loop"
            );
        }
        result
    }
}

#[async_trait]
impl OutboxRepository for PostgresOutboxRepository {
    async fn save(
        &self,
        message: &OutboxMessage,
        cancel: CancellationToken,
    ) -> RepositoryResult<()> {
        self.with_cancellable_retry(&cancel, "save", || async {
            let result = sqlx::query(
                "INSERT INTO outbox (id, payload, status, attempts, available_at, created_at)
                 VALUES ($1, $2, 'pending', 0, NOW(), NOW())",
            )
            .bind(&message.id)
            .bind(&message.payload)
            .execute(&self.pool)
            .await;

            match result {
                Ok(_) => Ok(()),
                Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                    Err(RepositoryError::DuplicateId {
                        id: message.id.clone(),
                    })
                }
                Err(e) => Err(RepositoryError::Database(e)),
            }
        })
        .await
    }

    async fn claim_batch(
        &self,
        limit: i64,
        lock_timeout: Duration,
        cancel: CancellationToken,
    ) -> RepositoryResult<Vec<OutboxMessage>> {
        let lock_timeout_secs = lock_timeout.as_secs_f64();
        self.with_cancellable_retry(&cancel, "claim_batch", || async {
            let rows = sqlx::query(
                r#"
                WITH claimable AS (
                    SELECT id
                    FROM outbox
                    WHERE (status = 'pending' AND available_at <= NOW())
                       OR (status = 'processing' AND picked_at + make_interval(secs => $2) <= NOW())
                    ORDER BY available_at ASC
                    LIMIT $1
                    FOR UPDATE SKIP LOCKED
                )
                UPDATE outbox
                SET status = 'processing', picked_at = NOW()
                FROM claimable
                WHERE outbox.id = claimable.id
                RETURNING outbox.id, outbox.payload, outbox.status, outbox.attempts,
                          outbox.available_at, outbox.picked_at, outbox.created_at
                "#,
            )
            .bind(limit)
            .bind(lock_timeout_secs)
            .fetch_all(&self.pool)
            .await
            .map_err(RepositoryError::Database)?;

            rows.into_iter()
                .map(|row| {
                    let status_str: String = row.try_get("status").map_err(RepositoryError::Database)?;
                    let status = status_str
                        .parse::<MessageStatus>()
                        .map_err(|e| RepositoryError::Database(sqlx::Error::Decode(e.into())))?;
                    Ok(OutboxMessage {
                        id: row.try_get("id").map_err(RepositoryError::Database)?,
                        payload: row.try_get("payload").map_err(RepositoryError::Database)?,
                        status,
                        attempts: row.try_get("attempts").map_err(RepositoryError::Database)?,
                        available_at: row.try_get("available_at").map_err(RepositoryError::Database)?,
                        picked_at: row.try_get("picked_at").map_err(RepositoryError::Database)?,
                        created_at: row.try_get("created_at").map_err(RepositoryError::Database)?,
                    })
                })
                .collect()
        })
        .await
    }

    async fn mark_sent(
        &self,
        id: &str,
        increment_attempts: bool,
        cancel: CancellationToken,
    ) -> RepositoryResult<()> {
        self.with_cancellable_retry(&cancel, "mark_sent", || async {
            let query = if increment_attempts {
                "UPDATE outbox SET status = 'sent', attempts = attempts + 1 WHERE id = $1"
            } else {
                "UPDATE outbox SET status = 'sent' WHERE id = $1"
            };
            let result = sqlx::query(query)
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(RepositoryError::Database)?;

            if result.rows_affected() == 0 {
                return Err(RepositoryError::NotFound { id: id.to_string() });
            }
            Ok(())
        })
        .await
    }

    async fn mark_failed(
        &self,
        id: &str,
        increment_attempts: bool,
        cancel: CancellationToken,
    ) -> RepositoryResult<()> {
        self.with_cancellable_retry(&cancel, "mark_failed", || async {
            let query = if increment_attempts {
                "UPDATE outbox SET status = 'failed', attempts = attempts + 1 WHERE id = $1"
            } else {
                "UPDATE outbox SET status = 'failed' WHERE id = $1"
            };
            let result = sqlx::query(query)
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(RepositoryError::Database)?;

            if result.rows_affected() == 0 {
                return Err(RepositoryError::NotFound { id: id.to_string() });
            }
            Ok(())
        })
        .await
    }

    async fn mark_for_retry(
        &self,
        id: &str,
        delay: Duration,
        increment_attempts: bool,
        cancel: CancellationToken,
    ) -> RepositoryResult<()> {
        let delay_secs = delay.as_secs_f64();
        self.with_cancellable_retry(&cancel, "mark_for_retry", || async {
            let query = if increment_attempts {
                "UPDATE outbox
                 SET status = 'pending',
                     available_at = NOW() + make_interval(secs => $2),
                     attempts = attempts + 1
                 WHERE id = $1"
            } else {
                "UPDATE outbox
                 SET status = 'pending',
                     available_at = NOW() + make_interval(secs => $2)
                 WHERE id = $1"
            };
            let result = sqlx::query(query)
                .bind(id)
                .bind(delay_secs)
                .execute(&self.pool)
                .await
                .map_err(RepositoryError::Database)?;

            if result.rows_affected() == 0 {
                return Err(RepositoryError::NotFound { id: id.to_string() });
            }
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_timeout_converts_to_fractional_seconds() {
        let d = Duration::from_millis(1500);
        assert_eq!(d.as_secs_f64(), 1.5);
    }
}
