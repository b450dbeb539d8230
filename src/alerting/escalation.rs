//! Retry and cool-down rules for an open downtime alert.

use chrono::{DateTime, Duration, Utc};

use crate::db::entities::alert;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscalationPolicy {
    /// Total number of downtime notifications sent for one incident.
    pub max_retries: i32,
    /// Minimum spacing between two downtime notifications.
    pub retry_interval: Duration,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_interval: Duration::minutes(10),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escalation {
    /// No open incident; start one and notify.
    Create,
    /// Open incident past its cool-down; notify again.
    Retry,
    CoolingDown,
    Exhausted,
}

/// Decides what a downtime evaluation does given the currently active alert.
pub fn decide(
    active: Option<&alert::Model>,
    now: DateTime<Utc>,
    policy: &EscalationPolicy,
) -> Escalation {
    let Some(alert) = active else {
        return Escalation::Create;
    };
    if alert.retry_count >= policy.max_retries {
        return Escalation::Exhausted;
    }
    if now - alert.last_sent_at < policy.retry_interval {
        return Escalation::CoolingDown;
    }
    Escalation::Retry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::enums::{AlertKind, TargetKind};
    use chrono::TimeZone;

    fn active_alert(sent_at: DateTime<Utc>, retry_count: i32) -> alert::Model {
        alert::Model {
            id: 1,
            target_kind: TargetKind::Website,
            target_id: 1,
            alert_type: AlertKind::Downtime,
            is_active: true,
            last_sent_at: sent_at,
            retry_count,
            created_at: sent_at,
        }
    }

    #[test]
    fn test_no_active_alert_creates() {
        let now = Utc::now();
        assert_eq!(
            decide(None, now, &EscalationPolicy::default()),
            Escalation::Create
        );
    }

    #[test]
    fn test_cool_down_then_retry() {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        let policy = EscalationPolicy::default();
        let alert = active_alert(t0, 1);

        assert_eq!(
            decide(Some(&alert), t0 + Duration::minutes(5), &policy),
            Escalation::CoolingDown
        );
        assert_eq!(
            decide(Some(&alert), t0 + Duration::minutes(11), &policy),
            Escalation::Retry
        );
        assert_eq!(
            decide(Some(&alert), t0 + Duration::minutes(10), &policy),
            Escalation::Retry
        );
    }

    #[test]
    fn test_retry_ceiling() {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        let policy = EscalationPolicy::default();
        let alert = active_alert(t0, 3);

        assert_eq!(
            decide(Some(&alert), t0 + Duration::hours(5), &policy),
            Escalation::Exhausted
        );
    }
}
