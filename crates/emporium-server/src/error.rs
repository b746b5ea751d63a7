//! Service-level errors and their HTTP mapping.

use axum::response::{IntoResponse, Response};
use emporium_api::ApiError;
use emporium_core::CoreError;
use emporium_storage::StorageError;

use crate::auth::{PasswordError, TokenError};
use crate::cache::CacheError;
use crate::validator::ValidatorError;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    AlreadyExists(String),

    #[error("{0}")]
    InvalidCredential(String),

    #[error("{0}")]
    PermissionDenied(String),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    Internal(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn category(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::AlreadyExists(_) => "already_exists",
            Self::InvalidCredential(_) => "invalid_credential",
            Self::PermissionDenied(_) => "permission_denied",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::Unavailable(_) => "unavailable",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { kind, id } => Self::NotFound(format!("{kind} '{id}' not found")),
            StorageError::AlreadyExists { kind, field, value } => {
                Self::AlreadyExists(format!("{kind} with {field} '{value}' already exists"))
            }
            StorageError::InvalidData { message } => Self::InvalidArgument(message),
            StorageError::ConnectionError { message } => {
                tracing::error!(error = %message, "store unreachable");
                Self::Unavailable("store unavailable".into())
            }
            other @ (StorageError::TransactionError { .. } | StorageError::Internal { .. }) => {
                tracing::error!(error = %other, "store error");
                Self::Internal(other.to_string())
            }
        }
    }
}

impl From<CoreError> for ServiceError {
    fn from(err: CoreError) -> Self {
        Self::InvalidArgument(err.to_string())
    }
}

impl From<ValidatorError> for ServiceError {
    fn from(err: ValidatorError) -> Self {
        tracing::warn!(error = %err, "owner validation failed");
        Self::Unavailable(err.to_string())
    }
}

impl From<CacheError> for ServiceError {
    fn from(err: CacheError) -> Self {
        Self::Internal(format!("cache: {err}"))
    }
}

impl From<PasswordError> for ServiceError {
    fn from(err: PasswordError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<TokenError> for ServiceError {
    fn from(err: TokenError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(m) => ApiError::not_found(m),
            ServiceError::AlreadyExists(m) => ApiError::already_exists(m),
            ServiceError::InvalidCredential(m) => ApiError::invalid_credential(m),
            ServiceError::PermissionDenied(m) => ApiError::permission_denied(m),
            ServiceError::InvalidArgument(m) => ApiError::invalid_argument(m),
            ServiceError::Unavailable(m) => ApiError::unavailable(m),
            ServiceError::Internal(m) => ApiError::internal(m),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}
