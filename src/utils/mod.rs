//! Reusable utilities shared across the dispatcher.

pub mod database_retry;

pub use database_retry::{with_retry, RetryConfig as DatabaseRetryConfig};
