use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::db::enums::AlertKind;
use crate::db::target::{Monitor, MonitorTarget, TargetRef};

/// Kind-specific facts carried alongside an alert event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EventDetail {
    Website {
        url: String,
        /// Status of the latest check; 0 when the connection failed.
        status_code: Option<i32>,
    },
    Heartbeat {
        interval_seconds: i32,
        last_ping: Option<DateTime<Utc>>,
    },
}

/// The payload every notification channel renders from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertEvent {
    pub target: TargetRef,
    pub name: String,
    pub owner_id: i32,
    pub kind: AlertKind,
    pub occurred_at: DateTime<Utc>,
    /// When the incident this event belongs to started.
    pub last_transition_at: DateTime<Utc>,
    pub duration_since_last_transition: i64,
    pub retry_count: i32,
    pub detail: EventDetail,
}

impl AlertEvent {
    pub fn new(
        monitor: &Monitor,
        kind: AlertKind,
        occurred_at: DateTime<Utc>,
        last_transition_at: DateTime<Utc>,
        retry_count: i32,
        last_status_code: Option<i32>,
    ) -> Self {
        let detail = match monitor {
            Monitor::Website(w) => EventDetail::Website {
                url: w.url.clone(),
                status_code: last_status_code,
            },
            Monitor::Heartbeat(h) => EventDetail::Heartbeat {
                interval_seconds: h.interval,
                last_ping: h.last_ping,
            },
        };
        Self {
            target: monitor.target_ref(),
            name: monitor.display_name(),
            owner_id: monitor.owner_id(),
            kind,
            occurred_at,
            last_transition_at,
            duration_since_last_transition: (occurred_at - last_transition_at)
                .num_seconds()
                .max(0),
            retry_count,
            detail,
        }
    }
}
