use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use std::pin::pin;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::due;
use super::locks::TargetLocks;
use super::schedule::heartbeat_next_due;
use super::MonitorError;
use crate::alerting::AlertManager;
use crate::clock::Clock;
use crate::db::enums::HeartbeatStatus;
use crate::db::store::{MonitorStore, PingMeta};
use crate::db::target::TargetRef;
use crate::metrics::MetricsSink;
use crate::ratelimit::RateLimiter;

/// Pings admitted per heartbeat within one interval.
pub const PINGS_PER_INTERVAL: u64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingOutcome {
    Accepted { heartbeat_id: i32, recovered: bool },
    RateLimited,
    NotFound,
}

pub struct HeartbeatMonitor {
    store: Arc<dyn MonitorStore>,
    limiter: Arc<RateLimiter>,
    alerts: Arc<AlertManager>,
    locks: Arc<TargetLocks>,
    clock: Arc<dyn Clock>,
    metrics: Arc<dyn MetricsSink>,
    page_size: u64,
}

impl HeartbeatMonitor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn MonitorStore>,
        limiter: Arc<RateLimiter>,
        alerts: Arc<AlertManager>,
        locks: Arc<TargetLocks>,
        clock: Arc<dyn Clock>,
        metrics: Arc<dyn MetricsSink>,
        page_size: u64,
    ) -> Self {
        Self {
            store,
            limiter,
            alerts,
            locks,
            clock,
            metrics,
            page_size,
        }
    }

    /// Handles an inbound ping addressed by the heartbeat's secret key.
    pub async fn accept_ping(&self, key: &str, meta: PingMeta) -> Result<PingOutcome, MonitorError> {
        let Ok(key) = Uuid::parse_str(key.trim()) else {
            return Ok(PingOutcome::NotFound);
        };
        let Some(heartbeat) = self.store.heartbeat_by_key(key).await? else {
            return Ok(PingOutcome::NotFound);
        };

        let window = u64::try_from(heartbeat.interval).unwrap_or(0).max(1);
        let Some(slot) = self
            .limiter
            .acquire(heartbeat.id, None, window, PINGS_PER_INTERVAL)
            .await
        else {
            debug!(heartbeat_id = heartbeat.id, "Ping dropped by rate limiter.");
            self.metrics.ping_rate_limited(heartbeat.id);
            return Ok(PingOutcome::RateLimited);
        };

        // A ping that never landed must not count against the window.
        match self.record(heartbeat.id, meta).await {
            Ok(Some(outcome)) => Ok(outcome),
            Ok(None) => {
                self.limiter.release(slot).await;
                Ok(PingOutcome::NotFound)
            }
            Err(e) => {
                self.limiter.release(slot).await;
                Err(e)
            }
        }
    }

    async fn record(
        &self,
        heartbeat_id: i32,
        meta: PingMeta,
    ) -> Result<Option<PingOutcome>, MonitorError> {
        let target = TargetRef::heartbeat(heartbeat_id);
        let _guard = self.locks.acquire(target).await;
        let Some(current) = self.store.get_heartbeat(heartbeat_id).await? else {
            return Ok(None);
        };

        let now = self.clock.now();
        let next_due = heartbeat_next_due(now, current.interval, current.grace_period);
        let record = self.store.record_ping(current.id, now, next_due, meta).await?;
        self.metrics.ping_received(current.id);

        let recovered = current.status == HeartbeatStatus::Down;
        if recovered {
            info!(heartbeat_id = current.id, name = %current.name, "Heartbeat recovered.");
            self.metrics.recovery_detected(target);
            self.alerts
                .announce_recovery(target, now, record.recovery.as_ref())
                .await;
        } else {
            debug!(heartbeat_id = current.id, next_due = %next_due, "Heartbeat ping accepted.");
        }

        Ok(Some(PingOutcome::Accepted {
            heartbeat_id: current.id,
            recovered,
        }))
    }

    /// Marks every overdue heartbeat down and raises its downtime alert.
    /// Returns how many heartbeats went down in this run.
    #[instrument(skip(self))]
    pub async fn detect_missed(&self) -> Result<usize, MonitorError> {
        let now = self.clock.now();
        let mut overdue = pin!(due::due_heartbeats(self.store.clone(), now, self.page_size));
        let mut missed = 0;
        while let Some(heartbeat) = overdue.try_next().await? {
            if self.mark_missed(heartbeat.id, now).await? {
                missed += 1;
            }
        }
        if missed > 0 {
            info!(missed, "Missed heartbeats detected.");
        }
        Ok(missed)
    }

    async fn mark_missed(&self, heartbeat_id: i32, now: DateTime<Utc>) -> Result<bool, MonitorError> {
        let target = TargetRef::heartbeat(heartbeat_id);
        let _guard = self.locks.acquire(target).await;
        let Some(current) = self.store.get_heartbeat(heartbeat_id).await? else {
            return Ok(false);
        };
        // A ping may have landed between the scan and the lock.
        let overdue = current.next_due.is_some_and(|due| due < now);
        if current.status == HeartbeatStatus::Down || !overdue {
            return Ok(false);
        }

        let applied = self
            .store
            .mark_heartbeat_missed(heartbeat_id, now, self.alerts.policy())
            .await?;
        warn!(
            heartbeat_id,
            name = %current.name,
            last_ping = ?current.last_ping,
            "Heartbeat missed its window."
        );
        self.metrics.heartbeat_missed(heartbeat_id);
        self.metrics.downtime_detected(target);
        self.alerts.announce_downtime(target, now, &applied).await;
        Ok(true)
    }
}
