//! Email delivery: the [`EmailSender`] trait, an SMTP adapter and the
//! templates used by the identity service.

pub mod email;
pub mod error;
pub mod templates;

pub use email::{
    EmailMessage, EmailSender, LogEmailSender, RecordingEmailSender, SmtpConfig, SmtpEmailSender,
};
pub use error::NotificationError;
pub use templates::{CONFIRMATION_TEMPLATE, RenderedContent, Template, TemplateRenderer};
