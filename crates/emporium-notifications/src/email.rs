//! Email senders.

use std::sync::Arc;

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::header::ContentType, transport::smtp::authentication::Credentials,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::NotificationError;

/// A plain-text email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Delivers a single email.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotificationError>;
}

/// SMTP settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub from: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

fn default_smtp_port() -> u16 {
    587
}

/// SMTP sender built on lettre. The transport is built once and reused.
pub struct SmtpEmailSender {
    from: lettre::message::Mailbox,
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpEmailSender {
    pub fn new(config: &SmtpConfig) -> Result<Self, NotificationError> {
        if config.host.is_empty() {
            return Err(NotificationError::InvalidConfig("Missing smtp host".into()));
        }

        let from = config
            .from
            .parse()
            .map_err(|e| NotificationError::InvalidConfig(format!("Invalid from: {e}")))?;

        let mut mailer_builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|e| NotificationError::InvalidConfig(e.to_string()))?
            .port(config.port);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            mailer_builder =
                mailer_builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            from,
            mailer: mailer_builder.build(),
        })
    }
}

#[async_trait]
impl EmailSender for SmtpEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotificationError> {
        let email = Message::builder()
            .from(self.from.clone())
            .to(message
                .to
                .parse()
                .map_err(|e| NotificationError::InvalidAddress(format!("{}: {e}", message.to)))?)
            .subject(message.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(message.body.clone())
            .map_err(|e| NotificationError::SendFailed(e.to_string()))?;

        self.mailer
            .send(email)
            .await
            .map_err(|e| NotificationError::SendFailed(e.to_string()))?;

        tracing::debug!(to = %message.to, "email sent");
        Ok(())
    }
}

/// Logs emails instead of sending them. Used when SMTP is disabled.
#[derive(Debug, Default, Clone)]
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotificationError> {
        tracing::info!(
            to = %message.to,
            subject = %message.subject,
            "SMTP disabled, email not delivered"
        );
        Ok(())
    }
}

/// Keeps every sent email in memory.
#[derive(Debug, Default, Clone)]
pub struct RecordingEmailSender {
    sent: Arc<Mutex<Vec<EmailMessage>>>,
    fail: bool,
}

impl RecordingEmailSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sender that rejects every message.
    pub fn failing() -> Self {
        Self {
            sent: Arc::default(),
            fail: true,
        }
    }

    pub async fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl EmailSender for RecordingEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotificationError> {
        if self.fail {
            return Err(NotificationError::SendFailed("recording sender set to fail".into()));
        }
        self.sent.lock().await.push(message.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SmtpConfig {
        SmtpConfig {
            host: "smtp.example.com".into(),
            port: 2525,
            from: "Emporium <no-reply@example.com>".into(),
            username: Some("mailer".into()),
            password: Some("secret".into()),
        }
    }

    #[tokio::test]
    async fn smtp_sender_builds_from_valid_config() {
        assert!(SmtpEmailSender::new(&config()).is_ok());
    }

    #[tokio::test]
    async fn smtp_sender_rejects_bad_from() {
        let cfg = SmtpConfig {
            from: "not an address".into(),
            ..config()
        };
        assert!(matches!(
            SmtpEmailSender::new(&cfg),
            Err(NotificationError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn recording_sender_keeps_messages() {
        let sender = RecordingEmailSender::new();
        let message = EmailMessage {
            to: "ada@example.com".into(),
            subject: "hi".into(),
            body: "body".into(),
        };
        sender.send(&message).await.unwrap();
        assert_eq!(sender.sent().await, vec![message]);

        assert!(RecordingEmailSender::failing().send(&EmailMessage {
            to: "x@example.com".into(),
            subject: String::new(),
            body: String::new(),
        })
        .await
        .is_err());
    }
}
