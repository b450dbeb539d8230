use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use super::{ensure_success, http_client, require_http_url, NotificationSender, SenderError};
use crate::alerting::events::AlertEvent;
use crate::notifications::models::RenderedMessage;

/// POSTs the alert event as JSON to a user-supplied URL.
pub struct WebhookSender {
    client: Client,
}

impl WebhookSender {
    pub fn new(timeout: Duration) -> Result<Self, SenderError> {
        Ok(Self {
            client: http_client(timeout)?,
        })
    }
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    subject: &'a str,
    message: &'a str,
    #[serde(flatten)]
    event: &'a AlertEvent,
}

#[async_trait]
impl NotificationSender for WebhookSender {
    async fn send(
        &self,
        address: &str,
        message: &RenderedMessage,
        event: &AlertEvent,
    ) -> Result<(), SenderError> {
        let url = require_http_url(address)?;
        let payload = WebhookPayload {
            subject: &message.subject,
            message: &message.body,
            event,
        };
        let response = self.client.post(url).json(&payload).send().await?;
        ensure_success("Webhook", response).await
    }
}
