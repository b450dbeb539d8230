use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;

use super::{NotificationSender, SenderError};
use crate::alerting::events::AlertEvent;
use crate::notifications::models::RenderedMessage;

#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
}

/// Sends alerts as plain-text mail over STARTTLS SMTP.
pub struct EmailSender {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl EmailSender {
    pub fn new(settings: &SmtpSettings, timeout: Duration) -> Result<Self, SenderError> {
        let from: Mailbox = settings.from.parse().map_err(|e| {
            SenderError::InvalidConfiguration(format!("invalid sender address: {e}"))
        })?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)?
            .port(settings.port)
            .timeout(Some(timeout));
        if let (Some(username), Some(password)) = (&settings.username, &settings.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            mailer: builder.build(),
            from,
        })
    }
}

pub(crate) fn build_message(
    from: &Mailbox,
    address: &str,
    message: &RenderedMessage,
) -> Result<Message, SenderError> {
    let to: Mailbox = address.trim().parse().map_err(|e| {
        SenderError::InvalidConfiguration(format!("invalid recipient {address:?}: {e}"))
    })?;
    Message::builder()
        .from(from.clone())
        .to(to)
        .subject(message.subject.as_str())
        .header(ContentType::TEXT_PLAIN)
        .body(message.body.clone())
        .map_err(|e| SenderError::InvalidConfiguration(format!("could not build email: {e}")))
}

#[async_trait]
impl NotificationSender for EmailSender {
    async fn send(
        &self,
        address: &str,
        message: &RenderedMessage,
        _event: &AlertEvent,
    ) -> Result<(), SenderError> {
        let email = build_message(&self.from, address, message)?;
        self.mailer.send(email).await?;
        Ok(())
    }
}
