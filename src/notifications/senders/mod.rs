use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::models::RenderedMessage;
use crate::alerting::events::AlertEvent;
use crate::db::enums::NotificationMethod;

pub mod email;
pub mod slack;
pub mod webhook;
pub mod whatsapp;

#[derive(Error, Debug)]
pub enum SenderError {
    #[error("Failed to send notification: {0}")]
    SendFailed(String),
    #[error("{provider} rejected the notification with status {status}. Body: {body}")]
    Rejected {
        provider: &'static str,
        status: u16,
        body: String,
    },
    #[error("Invalid configuration for sender: {0}")]
    InvalidConfiguration(String),
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("Delivery timed out after {0:?}")]
    TimedOut(Duration),
}

impl SenderError {
    /// Errors that will not go away by retrying the same request.
    pub fn is_permanent(&self) -> bool {
        match self {
            SenderError::InvalidConfiguration(_) => true,
            SenderError::Rejected { status, .. } => {
                (400..500).contains(status) && *status != 408 && *status != 429
            }
            SenderError::Smtp(e) => e.is_permanent(),
            SenderError::SendFailed(_)
            | SenderError::NetworkError(_)
            | SenderError::TimedOut(_) => false,
        }
    }
}

/// Delivers one rendered alert to one address over a single channel type.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(
        &self,
        address: &str,
        message: &RenderedMessage,
        event: &AlertEvent,
    ) -> Result<(), SenderError>;
}

/// Turns a non-2xx provider response into `SenderError::Rejected`.
pub(crate) async fn ensure_success(
    provider: &'static str,
    response: reqwest::Response,
) -> Result<(), SenderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to read error body".to_string());
    Err(SenderError::Rejected {
        provider,
        status: status.as_u16(),
        body,
    })
}

pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client, SenderError> {
    Ok(reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(crate::version::user_agent())
        .build()?)
}

pub(crate) fn require_http_url(address: &str) -> Result<&str, SenderError> {
    let trimmed = address.trim();
    if trimmed.starts_with("https://") || trimmed.starts_with("http://") {
        Ok(trimmed)
    } else {
        Err(SenderError::InvalidConfiguration(format!(
            "expected an http(s) URL, got {address:?}"
        )))
    }
}

/// Senders by channel type.
#[derive(Default, Clone)]
pub struct SenderRegistry {
    senders: HashMap<NotificationMethod, Arc<dyn NotificationSender>>,
}

impl SenderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, method: NotificationMethod, sender: Arc<dyn NotificationSender>) {
        self.senders.insert(method, sender);
    }

    pub fn get(&self, method: NotificationMethod) -> Option<Arc<dyn NotificationSender>> {
        self.senders.get(&method).cloned()
    }

    pub fn methods(&self) -> Vec<NotificationMethod> {
        let mut methods: Vec<_> = self.senders.keys().copied().collect();
        methods.sort_by_key(|m| m.to_string());
        methods
    }
}
