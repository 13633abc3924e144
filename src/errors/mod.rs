//! Centralized error types for the outbox dispatcher.
//!
//! Each layer of the crate returns its own `thiserror` enum rather than a
//! single catch-all: repositories return `RepositoryError`, publishers
//! return `PublishError`, a dispatcher tick returns `DispatchError`, and
//! configuration loading returns `ConfigError`. Layers above compose these
//! with `#[from]` rather than downcasting.

pub mod types;

pub use types::*;

pub type RepositoryResult<T> = Result<T, RepositoryError>;
pub type PublishResult<T> = Result<T, PublishError>;
pub type DispatchResult<T> = Result<T, DispatchError>;
pub type ConfigResult<T> = Result<T, ConfigError>;
