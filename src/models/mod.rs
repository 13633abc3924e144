//! The outbox message entity and its status lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row in the outbox table.
///
/// Mirrors the `outbox` schema: assigned by the producer at insert time,
/// mutated only by the dispatcher through the repository contract.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct OutboxMessage {
    pub id: String,
    pub payload: String,
    pub status: MessageStatus,
    pub attempts: i16,
    pub available_at: DateTime<Utc>,
    pub picked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl OutboxMessage {
    /// `retry_attempts = max(attempts - 1, 0)`: the first try is not a retry.
    pub fn retry_attempts(&self) -> i16 {
        (self.attempts - 1).max(0)
    }
}

/// Closed status enum. Unknown values from the store must be rejected, not
/// silently coerced — hence the explicit `TryFrom<&str>` rather than a
/// permissive `Default`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Pending,
    Processing,
    Sent,
    Failed,
}

impl MessageStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, MessageStatus::Sent | MessageStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MessageStatus::Pending => "pending",
            MessageStatus::Processing => "processing",
            MessageStatus::Sent => "sent",
            MessageStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MessageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(MessageStatus::Pending),
            "processing" => Ok(MessageStatus::Processing),
            "sent" => Ok(MessageStatus::Sent),
            "failed" => Ok(MessageStatus::Failed),
            other => Err(format!("unknown outbox message status '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_attempts_first_try_is_not_a_retry() {
        let mut m = sample();
        m.attempts = 0;
        assert_eq!(m.retry_attempts(), 0);
        m.attempts = 1;
        assert_eq!(m.retry_attempts(), 0);
        m.attempts = 4;
        assert_eq!(m.retry_attempts(), 3);
    }

    #[test]
    fn terminal_statuses() {
        assert!(MessageStatus::Sent.is_terminal());
        assert!(MessageStatus::Failed.is_terminal());
        assert!(!MessageStatus::Pending.is_terminal());
        assert!(!MessageStatus::Processing.is_terminal());
    }

    #[test]
    fn rejects_unknown_status_strings() {
        assert!("archived".parse::<MessageStatus>().is_err());
    }

    fn sample() -> OutboxMessage {
        OutboxMessage {
            id: "1".to_string(),
            payload: "{}".to_string(),
            status: MessageStatus::Pending,
            attempts: 0,
            available_at: Utc::now(),
            picked_at: None,
            created_at: Utc::now(),
        }
    }
}
