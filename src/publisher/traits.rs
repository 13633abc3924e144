use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::errors::PublishResult;
use crate::models::OutboxMessage;

/// The delivery boundary. The core does not distinguish transient from
/// permanent failures — every failure is retried until the message's
/// attempt budget is exhausted, so implementations don't need their own
/// retry logic; the dispatcher already provides it.
///
/// Implementations must tolerate being called with the same message id
/// more than once across dispatcher restarts: the core cannot guarantee
/// exactly-once delivery, only at-least-once.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(
        &self,
        message: &OutboxMessage,
        cancel: CancellationToken,
    ) -> PublishResult<()>;
}
