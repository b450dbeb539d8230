//! Plain-text alert messages rendered with tera.

use tera::{Context, Tera};

use super::models::RenderedMessage;
use crate::alerting::events::{AlertEvent, EventDetail};
use crate::db::enums::AlertKind;
use crate::monitoring::schedule::format_interval;

const WEBSITE_DOWN_SUBJECT: &str = "[DOWN] {{ name }} is not responding";
const WEBSITE_DOWN_BODY: &str = "{{ name }} ({{ url }}) is down.
Last status: {{ status }}
Down since: {{ since }}{% if retry_count > 1 %}
Still down after {{ duration }} (notice {{ retry_count }}).{% endif %}
Dashboard: {{ dashboard_url }}";

const WEBSITE_UP_SUBJECT: &str = "[UP] {{ name }} has recovered";
const WEBSITE_UP_BODY: &str = "{{ name }} ({{ url }}) is back up.
Downtime: {{ duration }}
Recovered at: {{ occurred_at }}
Dashboard: {{ dashboard_url }}";

const HEARTBEAT_MISSED_SUBJECT: &str = "[MISSED] {{ name }} did not check in";
const HEARTBEAT_MISSED_BODY: &str = "Heartbeat {{ name }} expected a ping every {{ interval }}.
Last ping: {{ last_ping }}
Missed at: {{ occurred_at }}
Dashboard: {{ dashboard_url }}";

const HEARTBEAT_UP_SUBJECT: &str = "[UP] {{ name }} is checking in again";
const HEARTBEAT_UP_BODY: &str = "Heartbeat {{ name }} is pinging again after {{ duration }}.
Recovered at: {{ occurred_at }}
Dashboard: {{ dashboard_url }}";

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

pub struct MessageRenderer {
    dashboard_url: String,
}

impl MessageRenderer {
    pub fn new(dashboard_url: impl Into<String>) -> Self {
        Self {
            dashboard_url: dashboard_url.into(),
        }
    }

    pub fn dashboard_url(&self) -> &str {
        &self.dashboard_url
    }

    pub fn render(&self, event: &AlertEvent) -> Result<RenderedMessage, tera::Error> {
        let (subject, body) = match (&event.detail, event.kind) {
            (EventDetail::Website { .. }, AlertKind::Downtime) => {
                (WEBSITE_DOWN_SUBJECT, WEBSITE_DOWN_BODY)
            }
            (EventDetail::Website { .. }, AlertKind::Recovery) => {
                (WEBSITE_UP_SUBJECT, WEBSITE_UP_BODY)
            }
            (EventDetail::Heartbeat { .. }, AlertKind::Downtime) => {
                (HEARTBEAT_MISSED_SUBJECT, HEARTBEAT_MISSED_BODY)
            }
            (EventDetail::Heartbeat { .. }, AlertKind::Recovery) => {
                (HEARTBEAT_UP_SUBJECT, HEARTBEAT_UP_BODY)
            }
        };
        let context = self.context(event);
        Ok(RenderedMessage {
            subject: Tera::one_off(subject, &context, false)?,
            body: Tera::one_off(body, &context, false)?,
        })
    }

    fn context(&self, event: &AlertEvent) -> Context {
        let mut context = Context::new();
        context.insert("name", &event.name);
        context.insert("kind", &event.kind.to_string());
        context.insert(
            "occurred_at",
            &event.occurred_at.format(TIMESTAMP_FORMAT).to_string(),
        );
        context.insert(
            "since",
            &event.last_transition_at.format(TIMESTAMP_FORMAT).to_string(),
        );
        context.insert(
            "duration",
            &format_interval(event.duration_since_last_transition),
        );
        context.insert("retry_count", &event.retry_count);
        context.insert("dashboard_url", &self.dashboard_url);

        match &event.detail {
            EventDetail::Website { url, status_code } => {
                context.insert("url", url);
                context.insert("status", &describe_status(*status_code));
            }
            EventDetail::Heartbeat {
                interval_seconds,
                last_ping,
            } => {
                context.insert("interval", &format_interval(i64::from(*interval_seconds)));
                let last_ping = last_ping
                    .map(|at| at.format(TIMESTAMP_FORMAT).to_string())
                    .unwrap_or_else(|| "Never".to_string());
                context.insert("last_ping", &last_ping);
            }
        }
        context
    }
}

pub fn describe_status(status_code: Option<i32>) -> String {
    match status_code {
        Some(code) if code > 0 => code.to_string(),
        _ => "Connection Failed".to_string(),
    }
}
