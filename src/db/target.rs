use serde::{Deserialize, Serialize};
use std::fmt;

use crate::db::entities::{heartbeat, website};
use crate::db::enums::TargetKind;

/// Reference to a monitor of either kind, as stored in alert and preference rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetRef {
    pub kind: TargetKind,
    pub id: i32,
}

impl TargetRef {
    pub fn new(kind: TargetKind, id: i32) -> Self {
        Self { kind, id }
    }

    pub fn website(id: i32) -> Self {
        Self::new(TargetKind::Website, id)
    }

    pub fn heartbeat(id: i32) -> Self {
        Self::new(TargetKind::Heartbeat, id)
    }
}

impl fmt::Display for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// What alerting needs to know about a monitor regardless of its kind.
pub trait MonitorTarget {
    fn target_ref(&self) -> TargetRef;
    fn owner_id(&self) -> i32;
    fn display_name(&self) -> String;
}

impl MonitorTarget for website::Model {
    fn target_ref(&self) -> TargetRef {
        TargetRef::website(self.id)
    }

    fn owner_id(&self) -> i32 {
        self.user_id
    }

    fn display_name(&self) -> String {
        match &self.name {
            Some(name) if !name.trim().is_empty() => name.clone(),
            _ => self.url.clone(),
        }
    }
}

impl MonitorTarget for heartbeat::Model {
    fn target_ref(&self) -> TargetRef {
        TargetRef::heartbeat(self.id)
    }

    fn owner_id(&self) -> i32 {
        self.user_id
    }

    fn display_name(&self) -> String {
        self.name.clone()
    }
}

/// A loaded monitor row of either kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Monitor {
    Website(website::Model),
    Heartbeat(heartbeat::Model),
}

impl MonitorTarget for Monitor {
    fn target_ref(&self) -> TargetRef {
        match self {
            Monitor::Website(w) => w.target_ref(),
            Monitor::Heartbeat(h) => h.target_ref(),
        }
    }

    fn owner_id(&self) -> i32 {
        match self {
            Monitor::Website(w) => w.owner_id(),
            Monitor::Heartbeat(h) => h.owner_id(),
        }
    }

    fn display_name(&self) -> String {
        match self {
            Monitor::Website(w) => w.display_name(),
            Monitor::Heartbeat(h) => h.display_name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn website(name: Option<&str>) -> website::Model {
        let now = Utc::now();
        website::Model {
            id: 7,
            user_id: 3,
            name: name.map(str::to_string),
            url: "https://example.com".to_string(),
            check_interval: 5,
            expected_status: 200,
            timeout_ms: 5000,
            is_active: true,
            is_down: false,
            last_downtime_at: None,
            last_recovered_at: None,
            next_check_at: now,
            created_at: now,
        }
    }

    #[test]
    fn test_display_name_falls_back_to_url() {
        assert_eq!(website(Some("Shop")).display_name(), "Shop");
        assert_eq!(website(None).display_name(), "https://example.com");
        assert_eq!(website(Some("  ")).display_name(), "https://example.com");
    }

    #[test]
    fn test_target_ref_display() {
        let monitor = Monitor::Website(website(None));
        assert_eq!(monitor.target_ref(), TargetRef::website(7));
        assert_eq!(monitor.owner_id(), 3);
        assert_eq!(TargetRef::heartbeat(12).to_string(), "heartbeat:12");
    }
}
