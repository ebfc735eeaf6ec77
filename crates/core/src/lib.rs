//! Shared primitives for all RBAC0 crates.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type used across RBAC0 crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::InvalidArgument(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

/// Common error categories surfaced by the authorization engine.
#[derive(Debug, Error)]
pub enum AppError {
    /// The controller slot was used before a backend was installed.
    #[error("not initialized: {0}")]
    NotInitialized(String),

    /// A backend was already installed in the controller slot.
    #[error("already initialized: {0}")]
    AlreadyInitialized(String),

    /// Malformed input, such as invalid pagination.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Requested role does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Write operation conflicts with an existing role name or identifier.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The relational store reported a failure.
    #[error("store failure: {0}")]
    Store(String),

    /// The policy engine reported a failure.
    #[error("policy engine failure: {0}")]
    Engine(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::{AppError, NonEmptyString};

    #[test]
    fn non_empty_string_rejects_whitespace() {
        let result = NonEmptyString::new("   ");
        assert!(matches!(result, Err(AppError::InvalidArgument(_))));
    }

    #[test]
    fn non_empty_string_keeps_original_value() {
        let value = NonEmptyString::new(" tenant admin ");
        assert_eq!(
            value.map(String::from).unwrap_or_default(),
            " tenant admin "
        );
    }

    #[test]
    fn conflict_message_carries_context() {
        let error = AppError::Conflict("role 'ops' already exists".to_owned());
        assert_eq!(error.to_string(), "conflict: role 'ops' already exists");
    }
}
