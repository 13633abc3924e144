//! The dispatcher loop: claims a batch of due messages each tick and drives
//! them through the publisher.

use std::sync::Arc;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{Config, RetryConfig};
use crate::errors::{DispatchError, DispatchResult};
use crate::models::OutboxMessage;
use crate::publisher::Publisher;
use crate::repository::OutboxRepository;
use crate::retry::{self, JitterSource};

/// Drives the dispatch loop against a repository and a publisher.
pub struct Dispatcher<R, P, J> {
    repository: Arc<R>,
    publisher: Arc<P>,
    jitter: J,
    fetch_limit: i64,
    processing_lock_timeout: std::time::Duration,
    poll_interval: std::time::Duration,
    retry_policy: RetryConfig,
}

impl<R, P, J> Dispatcher<R, P, J>
where
    R: OutboxRepository,
    P: Publisher,
    J: JitterSource,
{
    /// Builds a dispatcher from a validated configuration. Fails with
    /// `DispatchError::InvalidConfig` if `FetchLimit` is outside the
    /// `[1, 10000]` range spec.md §4.1 requires.
    pub fn new(
        repository: Arc<R>,
        publisher: Arc<P>,
        jitter: J,
        config: &Config,
    ) -> DispatchResult<Self> {
        let fetch_limit = config.dispatcher.fetch_limit;
        if !(1..=10_000).contains(&fetch_limit) {
            return Err(DispatchError::InvalidConfig(format!(
                "fetch_limit must be between 1 and 10000, got {fetch_limit}"
            )));
        }

        Ok(Self {
            repository,
            publisher,
            jitter,
            fetch_limit,
            processing_lock_timeout: config.dispatcher.processing_lock_timeout,
            poll_interval: config.dispatcher.poll_interval,
            retry_policy: config.retry.clone(),
        })
    }

    /// One tick of the dispatch loop, per the claim/publish/mark algorithm.
    /// Returns an error only if `ClaimBatch` itself fails; individual
    /// publish or Mark* failures are logged and do not abort the tick.
    pub async fn dispatch_once(&self, cancel: CancellationToken) -> DispatchResult<usize> {
        let claimed = self
            .repository
            .claim_batch(self.fetch_limit, self.processing_lock_timeout, cancel.clone())
            .await?;

        let claimed_count = claimed.len();
        if claimed_count > 0 {
            debug!(count = claimed_count, "claimed batch of outbox messages");
        }

        for message in claimed {
            if cancel.is_cancelled() {
                warn!(
                    claimed = claimed_count,
                    "tick cancelled, leaving remaining claimed messages processing for reclamation"
                );
                break;
            }
            self.dispatch_message(message, cancel.clone()).await;
        }

        Ok(claimed_count)
    }

    async fn dispatch_message(&self, message: OutboxMessage, cancel: CancellationToken) {
        let retry_attempts = message.retry_attempts();
        if retry_attempts >= self.retry_policy.max_retry_attempts as i16 {
            info!(
                id = %message.id,
                retry_attempts,
                "message already over retry budget at claim time, finalizing as failed"
            );
            if let Err(e) = self
                .repository
                .mark_failed(&message.id, false, cancel)
                .await
            {
                warn!(id = %message.id, error = %e, "failed to mark over-budget message as failed");
            }
            return;
        }

        match self.publisher.publish(&message, cancel.clone()).await {
            Ok(()) => {
                info!(id = %message.id, attempts = message.attempts, "message sent");
                if let Err(e) = self.repository.mark_sent(&message.id, true, cancel).await {
                    warn!(id = %message.id, error = %e, "failed to mark message as sent");
                }
            }
            Err(publish_err) => {
                let next_attempt = message.attempts + 1;
                let next_retry_attempts = (next_attempt - 1).max(0);

                if next_retry_attempts < self.retry_policy.max_retry_attempts as i16 {
                    let delay = retry::delay(
                        next_attempt.clamp(0, u8::MAX as i16) as u8,
                        &self.retry_policy,
                        &self.jitter,
                    );
                    warn!(
                        id = %message.id,
                        attempts = next_attempt,
                        ?delay,
                        error = %publish_err.0,
                        "publish failed, scheduling retry"
                    );
                    if let Err(e) = self
                        .repository
                        .mark_for_retry(&message.id, delay, true, cancel)
                        .await
                    {
                        warn!(id = %message.id, error = %e, "failed to schedule message retry");
                    }
                } else {
                    error!(
                        id = %message.id,
                        attempts = next_attempt,
                        error = %publish_err.0,
                        "publish failed, retry budget exhausted"
                    );
                    if let Err(e) = self
                        .repository
                        .mark_failed(&message.id, true, cancel)
                        .await
                    {
                        warn!(id = %message.id, error = %e, "failed to mark message as failed");
                    }
                }
            }
        }
    }

    /// Drives ticks on `poll_interval`, selecting between the tick timer and
    /// cancellation, exactly as a periodic background runner would.
    pub async fn run(&self, cancellation_token: CancellationToken) {
        info!(poll_interval = ?self.poll_interval, "starting dispatcher loop");
        let mut ticker = interval(self.poll_interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.dispatch_once(cancellation_token.clone()).await {
                        error!(error = %e, "dispatcher tick failed");
                    }
                }
                _ = cancellation_token.cancelled() => {
                    info!("dispatcher received cancellation signal, stopping");
                    break;
                }
            }
        }

        info!("dispatcher loop stopped");
    }
}
