use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Template not found: {0}")]
    TemplateNotFound(String),
}
