//! Injected sink for monitoring events. Exporters live behind this trait;
//! the default implementation only emits structured trace events.

use tracing::debug;

use crate::db::enums::NotificationMethod;
use crate::db::target::TargetRef;

pub trait MetricsSink: Send + Sync {
    fn check_completed(&self, _website_id: i32, _status_code: i32, _response_time_ms: f64) {}
    fn downtime_detected(&self, _target: TargetRef) {}
    fn recovery_detected(&self, _target: TargetRef) {}
    fn ping_received(&self, _heartbeat_id: i32) {}
    fn ping_rate_limited(&self, _heartbeat_id: i32) {}
    fn heartbeat_missed(&self, _heartbeat_id: i32) {}
    fn alert_outcome(&self, _target: TargetRef, _outcome: &'static str) {}
    fn delivery_finished(&self, _method: NotificationMethod, _delivered: bool, _attempts: u32) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {}

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMetrics;

impl MetricsSink for TracingMetrics {
    fn check_completed(&self, website_id: i32, status_code: i32, response_time_ms: f64) {
        debug!(
            metric = "uptime_check",
            website_id, status_code, response_time_ms, "Website check completed."
        );
    }

    fn downtime_detected(&self, target: TargetRef) {
        debug!(metric = "downtime_detected", monitor = %target, "Monitor went down.");
    }

    fn recovery_detected(&self, target: TargetRef) {
        debug!(metric = "recovery_detected", monitor = %target, "Monitor recovered.");
    }

    fn ping_received(&self, heartbeat_id: i32) {
        debug!(metric = "heartbeat_ping", heartbeat_id, "Heartbeat ping accepted.");
    }

    fn ping_rate_limited(&self, heartbeat_id: i32) {
        debug!(metric = "heartbeat_ping_rate_limited", heartbeat_id, "Heartbeat ping dropped.");
    }

    fn heartbeat_missed(&self, heartbeat_id: i32) {
        debug!(metric = "heartbeat_missed", heartbeat_id, "Heartbeat missed its window.");
    }

    fn alert_outcome(&self, target: TargetRef, outcome: &'static str) {
        debug!(metric = "alert_escalation", monitor = %target, outcome, "Alert escalation evaluated.");
    }

    fn delivery_finished(&self, method: NotificationMethod, delivered: bool, attempts: u32) {
        debug!(
            metric = "notification_delivery",
            method = %method, delivered, attempts, "Notification delivery finished."
        );
    }
}
