//! Error types for subscription tracking

use std::time::Duration;
use thiserror::Error;

use crate::month::MonthParseError;

/// Subscription error type
#[derive(Debug, Clone, Error)]
pub enum SubscriptionError {
    /// Input rejected before reaching storage
    #[error("validation error: {0}")]
    Validation(String),

    /// No subscription with the given id
    #[error("subscription {0} not found")]
    NotFound(i64),

    /// Connection failure, constraint violation or other storage fault
    #[error("storage error: {0}")]
    Storage(String),

    /// Storage call exceeded its deadline
    #[error("storage call timed out after {0:?}")]
    Timeout(Duration),
}

impl SubscriptionError {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Whether this error came from the storage layer (timeouts included)
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Timeout(_))
    }
}

impl From<MonthParseError> for SubscriptionError {
    fn from(error: MonthParseError) -> Self {
        Self::Validation(error.to_string())
    }
}

impl From<sqlx::Error> for SubscriptionError {
    fn from(error: sqlx::Error) -> Self {
        Self::Storage(error.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for SubscriptionError {
    fn from(error: sqlx::migrate::MigrateError) -> Self {
        Self::Storage(format!("migration failed: {error}"))
    }
}

/// Result type for subscription operations
pub type SubscriptionResult<T> = Result<T, SubscriptionError>;
