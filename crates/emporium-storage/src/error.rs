//! Storage error types.

use std::fmt;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested entity was not found.
    #[error("Not found: {kind}/{id}")]
    NotFound {
        /// Entity kind, e.g. `user` or `instrument`.
        kind: String,
        /// The id (or unique field value) that was looked up.
        id: String,
    },

    /// A uniqueness constraint was violated.
    #[error("Already exists: {kind} with {field} '{value}'")]
    AlreadyExists {
        kind: String,
        /// The unique field that collided.
        field: String,
        value: String,
    },

    /// The entity data is invalid for this backend.
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    /// An error occurred while running a transaction.
    #[error("Transaction error: {message}")]
    TransactionError { message: String },

    /// Failed to reach the storage backend.
    #[error("Connection error: {message}")]
    ConnectionError { message: String },

    /// An internal storage error occurred.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl StorageError {
    #[must_use]
    pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }

    #[must_use]
    pub fn already_exists(
        kind: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::AlreadyExists {
            kind: kind.into(),
            field: field.into(),
            value: value.into(),
        }
    }

    #[must_use]
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn transaction_error(message: impl Into<String>) -> Self {
        Self::TransactionError {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn connection_error(message: impl Into<String>) -> Self {
        Self::ConnectionError {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Returns the error category for logging purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::AlreadyExists { .. } => ErrorCategory::Conflict,
            Self::InvalidData { .. } => ErrorCategory::Validation,
            Self::TransactionError { .. } => ErrorCategory::Transaction,
            Self::ConnectionError { .. } => ErrorCategory::Infrastructure,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

/// Categories of storage errors for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    NotFound,
    Conflict,
    Validation,
    Transaction,
    Infrastructure,
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::Conflict => write!(f, "conflict"),
            Self::Validation => write!(f, "validation"),
            Self::Transaction => write!(f, "transaction"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StorageError::not_found("user", "42");
        assert_eq!(err.to_string(), "Not found: user/42");

        let err = StorageError::already_exists("user", "email", "ada@example.com");
        assert_eq!(
            err.to_string(),
            "Already exists: user with email 'ada@example.com'"
        );

        let err = StorageError::connection_error("refused");
        assert_eq!(err.to_string(), "Connection error: refused");
    }

    #[test]
    fn test_predicates() {
        assert!(StorageError::not_found("order", "1").is_not_found());
        assert!(!StorageError::internal("boom").is_not_found());
        assert!(StorageError::already_exists("instrument", "name", "Oboe").is_already_exists());
    }

    #[test]
    fn test_categories() {
        assert_eq!(
            StorageError::not_found("user", "1").category(),
            ErrorCategory::NotFound
        );
        assert_eq!(
            StorageError::already_exists("user", "email", "x").category(),
            ErrorCategory::Conflict
        );
        assert_eq!(
            StorageError::connection_error("x").category(),
            ErrorCategory::Infrastructure
        );
        assert_eq!(ErrorCategory::Transaction.to_string(), "transaction");
    }
}
