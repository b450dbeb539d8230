use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::locks::TargetLocks;
use super::schedule::{confirms_downtime, next_website_check, DOWNTIME_STRIKES};
use super::MonitorError;
use crate::alerting::AlertManager;
use crate::checks::WebsiteProber;
use crate::clock::Clock;
use crate::db::store::{MonitorStore, NewCheckResult, DEFAULT_TIMEOUT_MS};
use crate::db::target::TargetRef;
use crate::metrics::MetricsSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Unchanged,
    WentDown,
    /// Still failing after downtime was already declared.
    StillDown,
    Recovered,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckReport {
    pub website_id: i32,
    pub status_code: i32,
    pub response_time_ms: f64,
    pub transition: Transition,
    pub next_check_at: DateTime<Utc>,
}

pub struct WebsiteMonitor {
    store: Arc<dyn MonitorStore>,
    prober: Arc<dyn WebsiteProber>,
    alerts: Arc<AlertManager>,
    locks: Arc<TargetLocks>,
    clock: Arc<dyn Clock>,
    metrics: Arc<dyn MetricsSink>,
}

impl WebsiteMonitor {
    pub fn new(
        store: Arc<dyn MonitorStore>,
        prober: Arc<dyn WebsiteProber>,
        alerts: Arc<AlertManager>,
        locks: Arc<TargetLocks>,
        clock: Arc<dyn Clock>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            store,
            prober,
            alerts,
            locks,
            clock,
            metrics,
        }
    }

    /// Probes one website, records the result and applies any state change.
    /// Returns `None` when the website is gone or paused.
    pub async fn check_website(&self, website_id: i32) -> Result<Option<CheckReport>, MonitorError> {
        let Some(website) = self.store.get_website(website_id).await? else {
            debug!(website_id, "Website no longer exists; skipping check.");
            return Ok(None);
        };
        if !website.is_active {
            debug!(website_id, "Website is paused; skipping check.");
            return Ok(None);
        }

        let timeout = u64::try_from(website.timeout_ms)
            .ok()
            .filter(|ms| *ms > 0)
            .unwrap_or(DEFAULT_TIMEOUT_MS as u64);
        let probe = self
            .prober
            .probe(&website.url, Duration::from_millis(timeout))
            .await;
        let now = self.clock.now();

        let target = TargetRef::website(website_id);
        let _guard = self.locks.acquire(target).await;
        // Re-read under the lock so state written by a concurrent check is not lost.
        let Some(mut website) = self.store.get_website(website_id).await? else {
            return Ok(None);
        };

        self.store
            .save_check_result(NewCheckResult {
                website_id,
                status_code: probe.status_code,
                error_message: probe.error_message.clone(),
                response_time_ms: probe.response_time_ms,
                checked_at: now,
            })
            .await?;
        self.metrics
            .check_completed(website_id, probe.status_code, probe.response_time_ms);

        let transition = if probe.is_success() {
            if website.is_down {
                website.is_down = false;
                website.last_recovered_at = Some(now);
                Transition::Recovered
            } else {
                Transition::Unchanged
            }
        } else {
            let recent = self
                .store
                .recent_check_results(website_id, DOWNTIME_STRIKES as u64)
                .await?;
            match (confirms_downtime(&recent), website.is_down) {
                (false, _) => Transition::Unchanged,
                (true, true) => Transition::StillDown,
                (true, false) => {
                    website.is_down = true;
                    website.last_downtime_at = Some(now);
                    Transition::WentDown
                }
            }
        };

        website.next_check_at = next_website_check(now, website.check_interval);
        let policy = self.alerts.policy();

        // State and alert rows commit in one store call.
        match transition {
            Transition::Unchanged => {
                self.store.save_website_state(&website).await?;
                debug!(
                    website_id,
                    status_code = probe.status_code,
                    response_time_ms = probe.response_time_ms,
                    "Website checked."
                );
            }
            Transition::WentDown => {
                let applied = self.store.save_website_downtime(&website, now, policy).await?;
                warn!(
                    website_id,
                    url = %website.url,
                    status_code = probe.status_code,
                    error = probe.error_message.as_deref().unwrap_or(""),
                    "Website is down."
                );
                self.metrics.downtime_detected(target);
                self.alerts.announce_downtime(target, now, &applied).await;
            }
            Transition::StillDown => {
                let applied = self.store.save_website_downtime(&website, now, policy).await?;
                debug!(website_id, status_code = probe.status_code, "Website is still down.");
                self.alerts.announce_downtime(target, now, &applied).await;
            }
            Transition::Recovered => {
                let record = self.store.save_website_recovery(&website, now).await?;
                info!(website_id, url = %website.url, "Website recovered.");
                self.metrics.recovery_detected(target);
                self.alerts.announce_recovery(target, now, record.as_ref()).await;
            }
        }

        Ok(Some(CheckReport {
            website_id,
            status_code: probe.status_code,
            response_time_ms: probe.response_time_ms,
            transition,
            next_check_at: website.next_check_at,
        }))
    }
}
