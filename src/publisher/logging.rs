use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::errors::PublishResult;
use crate::models::OutboxMessage;
use crate::publisher::traits::Publisher;

/// A publisher that records every publish via `tracing::info!` and always
/// succeeds. Used in the dispatcher binary's default wiring when no real
/// broker is configured, and in doctests.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingPublisher;

#[async_trait]
impl Publisher for LoggingPublisher {
    async fn publish(
        &self,
        message: &OutboxMessage,
        _cancel: CancellationToken,
    ) -> PublishResult<()> {
        info!(
            id = %message.id,
            attempts = message.attempts,
            payload_len = message.payload.len(),
            "message published"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn always_succeeds() {
        let publisher = LoggingPublisher;
        let message = OutboxMessage {
            id: "1".to_string(),
            payload: "{}".to_string(),
            status: crate::models::MessageStatus::Processing,
            attempts: 0,
            available_at: Utc::now(),
            picked_at: Some(Utc::now()),
            created_at: Utc::now(),
        };

        assert!(publisher
            .publish(&message, CancellationToken::new())
            .await
            .is_ok());
    }
}
