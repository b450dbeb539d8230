use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use super::{ensure_success, http_client, require_http_url, NotificationSender, SenderError};
use crate::alerting::events::AlertEvent;
use crate::notifications::models::RenderedMessage;

/// Posts to a Slack incoming webhook; the preference address is the hook URL.
pub struct SlackSender {
    client: Client,
}

impl SlackSender {
    pub fn new(timeout: Duration) -> Result<Self, SenderError> {
        Ok(Self {
            client: http_client(timeout)?,
        })
    }
}

#[derive(Serialize)]
struct SlackMessage {
    text: String,
}

fn slack_text(message: &RenderedMessage) -> String {
    format!("*{}*\n{}", message.subject, message.body)
}

#[async_trait]
impl NotificationSender for SlackSender {
    async fn send(
        &self,
        address: &str,
        message: &RenderedMessage,
        _event: &AlertEvent,
    ) -> Result<(), SenderError> {
        let url = require_http_url(address)?;
        let payload = SlackMessage {
            text: slack_text(message),
        };
        let response = self.client.post(url).json(&payload).send().await?;
        ensure_success("Slack", response).await
    }
}
