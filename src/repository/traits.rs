use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::errors::RepositoryResult;
use crate::models::OutboxMessage;

/// The storage contract the dispatcher is generic over. Implementations are
/// swapped by composition, not inheritance — the dispatcher only ever holds
/// a `dyn OutboxRepository` or a generic `R: OutboxRepository`.
///
/// Every method accepts a `CancellationToken` so a shutdown can interrupt an
/// in-flight retry loop inside the implementation without the caller
/// needing to know about its internals.
#[async_trait]
pub trait OutboxRepository: Send + Sync {
    /// Inserts a new row with `status=pending`, `attempts=0`. Fails with
    /// `RepositoryError::DuplicateId` if `message.id` already exists.
    async fn save(
        &self,
        message: &OutboxMessage,
        cancel: CancellationToken,
    ) -> RepositoryResult<()>;

    /// Atomically selects up to `limit` rows that are either pending and
    /// due, or processing past their lock timeout, transitions them to
    /// `processing`, and returns the claimed snapshots ordered by
    /// `available_at`. No two concurrent callers may claim the same row.
    async fn claim_batch(
        &self,
        limit: i64,
        lock_timeout: Duration,
        cancel: CancellationToken,
    ) -> RepositoryResult<Vec<OutboxMessage>>;

    /// Transitions `id` to `sent`, optionally incrementing `attempts`.
    async fn mark_sent(
        &self,
        id: &str,
        increment_attempts: bool,
        cancel: CancellationToken,
    ) -> RepositoryResult<()>;

    /// Transitions `id` to `failed`, optionally incrementing `attempts`.
    async fn mark_failed(
        &self,
        id: &str,
        increment_attempts: bool,
        cancel: CancellationToken,
    ) -> RepositoryResult<()>;

    /// Transitions `id` back to `pending`, sets `available_at = now() +
    /// delay`, optionally incrementing `attempts`.
    async fn mark_for_retry(
        &self,
        id: &str,
        delay: Duration,
        increment_attempts: bool,
        cancel: CancellationToken,
    ) -> RepositoryResult<()>;
}
