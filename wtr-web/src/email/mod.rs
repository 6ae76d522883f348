//! Outbound email: transport, templates, sequences and trigger rules

pub mod mailer;
pub mod promo_sequences;
pub mod sequences;
pub mod templates;
pub mod triggers;

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

pub use mailer::{LogMailer, MailError, Mailer, SmtpMailer};

/// Rendered email body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailContent {
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Addressed email ready for a [`Mailer`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub content: EmailContent,
}

impl EmailMessage {
    pub fn new(to: impl Into<String>, content: EmailContent) -> Self {
        Self {
            to: to.into(),
            content,
        }
    }
}

/// Send without waiting; failures are logged and dropped
///
/// Used for transactional mail that must never fail the request that
/// caused it.
pub fn spawn_send(mailer: Arc<dyn Mailer>, message: EmailMessage, kind: &'static str) {
    tokio::spawn(async move {
        match mailer.send(&message).await {
            Ok(()) => debug!(to = %message.to, kind, "Sent email"),
            Err(e) => warn!(to = %message.to, kind, "Failed to send email: {}", e),
        }
    });
}
