use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

use super::{ensure_success, http_client, NotificationSender, SenderError};
use crate::alerting::events::{AlertEvent, EventDetail};
use crate::db::enums::AlertKind;
use crate::monitoring::schedule::format_interval;
use crate::notifications::models::RenderedMessage;
use crate::notifications::templates::{describe_status, TIMESTAMP_FORMAT};

pub const GRAPH_API_BASE: &str = "https://graph.facebook.com/v18.0";

#[derive(Debug, Clone)]
pub struct WhatsAppSettings {
    pub token: String,
    pub phone_number_id: String,
    pub api_base: String,
    pub dashboard_url: String,
}

/// Sends pre-approved WhatsApp Business template messages through the Graph API.
pub struct WhatsAppSender {
    client: Client,
    settings: WhatsAppSettings,
}

impl WhatsAppSender {
    pub fn new(settings: WhatsAppSettings, timeout: Duration) -> Result<Self, SenderError> {
        if settings.token.is_empty() || settings.phone_number_id.is_empty() {
            return Err(SenderError::InvalidConfiguration(
                "WhatsApp token and phone number id are required".to_string(),
            ));
        }
        Ok(Self {
            client: http_client(timeout)?,
            settings,
        })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/{}/messages",
            self.settings.api_base.trim_end_matches('/'),
            self.settings.phone_number_id
        )
    }
}

/// Digits only, country code first.
fn normalize_number(address: &str) -> Result<String, SenderError> {
    let digits: String = address.chars().filter(char::is_ascii_digit).collect();
    if digits.len() < 8 {
        return Err(SenderError::InvalidConfiguration(format!(
            "invalid WhatsApp number {address:?}"
        )));
    }
    Ok(digits)
}

/// Template name and positional body parameters for an event.
fn template_for(event: &AlertEvent, dashboard_url: &str) -> (&'static str, Vec<String>) {
    let occurred_at = event.occurred_at.format(TIMESTAMP_FORMAT).to_string();
    let duration = format_interval(event.duration_since_last_transition);
    match (&event.detail, event.kind) {
        (EventDetail::Website { url, status_code }, AlertKind::Downtime) => (
            "website_down_alert",
            vec![
                event.name.clone(),
                url.clone(),
                describe_status(*status_code),
                event.last_transition_at.format(TIMESTAMP_FORMAT).to_string(),
                dashboard_url.to_string(),
            ],
        ),
        (EventDetail::Website { url, .. }, AlertKind::Recovery) => (
            "website_recovered",
            vec![
                event.name.clone(),
                url.clone(),
                duration,
                occurred_at,
                dashboard_url.to_string(),
            ],
        ),
        (
            EventDetail::Heartbeat {
                interval_seconds,
                last_ping,
            },
            AlertKind::Downtime,
        ) => (
            "heartbeat_missed",
            vec![
                event.name.clone(),
                format_interval(i64::from(*interval_seconds)),
                last_ping
                    .map(|at| at.format(TIMESTAMP_FORMAT).to_string())
                    .unwrap_or_else(|| "Never".to_string()),
                occurred_at,
                dashboard_url.to_string(),
            ],
        ),
        (EventDetail::Heartbeat { .. }, AlertKind::Recovery) => (
            "heartbeat_recovered",
            vec![
                event.name.clone(),
                duration,
                occurred_at,
                dashboard_url.to_string(),
            ],
        ),
    }
}

fn template_payload(to: &str, template_name: &str, parameters: &[String]) -> Value {
    let parameters: Vec<Value> = parameters
        .iter()
        .map(|p| json!({ "type": "text", "text": p }))
        .collect();
    json!({
        "messaging_product": "whatsapp",
        "to": to,
        "type": "template",
        "template": {
            "name": template_name,
            "language": { "code": "en" },
            "components": [{ "type": "body", "parameters": parameters }],
        },
    })
}

#[async_trait]
impl NotificationSender for WhatsAppSender {
    async fn send(
        &self,
        address: &str,
        _message: &RenderedMessage,
        event: &AlertEvent,
    ) -> Result<(), SenderError> {
        let to = normalize_number(address)?;
        let (template_name, parameters) = template_for(event, &self.settings.dashboard_url);
        let payload = template_payload(&to, template_name, &parameters);

        let response = self
            .client
            .post(self.messages_url())
            .bearer_auth(&self.settings.token)
            .json(&payload)
            .send()
            .await?;
        ensure_success("WhatsApp", response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::target::TargetRef;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};

    fn heartbeat_event(kind: AlertKind) -> AlertEvent {
        let start = Utc.with_ymd_and_hms(2024, 7, 9, 2, 0, 0).unwrap();
        AlertEvent {
            target: TargetRef::heartbeat(2),
            name: "etl".to_string(),
            owner_id: 1,
            kind,
            occurred_at: start + ChronoDuration::hours(2),
            last_transition_at: start,
            duration_since_last_transition: 7200,
            retry_count: 1,
            detail: EventDetail::Heartbeat {
                interval_seconds: 3600,
                last_ping: Some(start),
            },
        }
    }

    #[test]
    fn test_number_is_reduced_to_digits() {
        assert_eq!(normalize_number("+234 814 725 0442").unwrap(), "2348147250442");
        assert!(normalize_number("call me").is_err());
    }

    #[test]
    fn test_heartbeat_templates() {
        let (name, params) = template_for(&heartbeat_event(AlertKind::Downtime), "https://d");
        assert_eq!(name, "heartbeat_missed");
        assert_eq!(params[1], "1 hour");
        assert_eq!(params[2], "2024-07-09 02:00:00 UTC");

        let (name, params) = template_for(&heartbeat_event(AlertKind::Recovery), "https://d");
        assert_eq!(name, "heartbeat_recovered");
        assert_eq!(params, vec!["etl", "2 hours", "2024-07-09 04:00:00 UTC", "https://d"]);
    }

    #[test]
    fn test_payload_shape() {
        let payload = template_payload("123456789", "website_down_alert", &["a".to_string()]);
        assert_eq!(payload["messaging_product"], "whatsapp");
        assert_eq!(payload["template"]["name"], "website_down_alert");
        assert_eq!(
            payload["template"]["components"][0]["parameters"][0]["text"],
            "a"
        );
    }

    #[test]
    fn test_missing_credentials_rejected() {
        let settings = WhatsAppSettings {
            token: String::new(),
            phone_number_id: "1".to_string(),
            api_base: GRAPH_API_BASE.to_string(),
            dashboard_url: "https://d".to_string(),
        };
        assert!(WhatsAppSender::new(settings, Duration::from_secs(5)).is_err());
    }
}
