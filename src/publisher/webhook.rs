use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::errors::{PublishError, PublishResult};
use crate::models::OutboxMessage;
use crate::publisher::traits::Publisher;

/// HTTP publisher that POSTs the message payload to a fixed endpoint, with
/// the message id carried as a header — the closest idiomatic Rust analogue
/// of sending the payload as an SQS message body with the id as a message
/// attribute, for a broker-agnostic core that must not hard-depend on an
/// AWS SDK.
pub struct WebhookPublisher {
    client: reqwest::Client,
    endpoint: String,
}

impl WebhookPublisher {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client configuration is static and always valid");

        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl Publisher for WebhookPublisher {
    async fn publish(
        &self,
        message: &OutboxMessage,
        cancel: CancellationToken,
    ) -> PublishResult<()> {
        let request = self
            .client
            .post(&self.endpoint)
            .header("X-Message-Id", message.id.clone())
            .header("Content-Type", "application/json")
            .body(message.payload.clone())
            .send();

        let response = tokio::select! {
            result = request => result.map_err(PublishError::new)?,
            _ = cancel.cancelled() => {
                warn!(id = %message.id, "publish cancelled before response");
                return Err(PublishError::new(anyhow::anyhow!("publish cancelled")));
            }
        };

        if response.status().is_success() {
            debug!(id = %message.id, status = %response.status(), "webhook publish succeeded");
            Ok(())
        } else {
            Err(PublishError::new(anyhow::anyhow!(
                "webhook endpoint returned {}",
                response.status()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_is_stored_verbatim() {
        let publisher = WebhookPublisher::new("http://localhost:9000/hook", Duration::from_secs(5));
        assert_eq!(publisher.endpoint, "http://localhost:9000/hook");
    }
}
