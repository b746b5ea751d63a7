use thiserror::Error;

/// Validation errors raised while building domain values.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid ID: {0}")]
    InvalidId(String),

    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl CoreError {
    /// Create a new InvalidId error
    pub fn invalid_id(id: impl Into<String>) -> Self {
        Self::InvalidId(id.into())
    }

    /// Create a new InvalidField error
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Name of the offending field, if the error is tied to one.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::InvalidField { field, .. } => Some(field),
            Self::InvalidId(_) => Some("id"),
            Self::JsonError(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

pub(crate) fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(CoreError::invalid_field(field, "must not be empty"));
    }
    Ok(())
}
