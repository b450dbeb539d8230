//! Pruning of old website check results. Alert history is never touched.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

use crate::clock::Clock;
use crate::db::store::{MonitorStore, StoreError};

pub const DEFAULT_RETENTION_DAYS: i64 = 90;

/// Deletes check results recorded before `now - retention_days`.
pub async fn purge_check_results(
    store: &dyn MonitorStore,
    now: DateTime<Utc>,
    retention_days: i64,
) -> Result<u64, StoreError> {
    if retention_days <= 0 {
        return Err(StoreError::Invalid(format!(
            "retention must be at least one day, got {retention_days}"
        )));
    }
    let cutoff = now - Duration::days(retention_days);
    let deleted = store.delete_check_results_before(cutoff).await?;
    info!(deleted, cutoff = %cutoff, "Deleted old uptime check results.");
    Ok(deleted)
}

pub struct RetentionTask {
    store: Arc<dyn MonitorStore>,
    clock: Arc<dyn Clock>,
    retention_days: i64,
    every: std::time::Duration,
}

impl RetentionTask {
    pub fn new(
        store: Arc<dyn MonitorStore>,
        clock: Arc<dyn Clock>,
        retention_days: i64,
        every: std::time::Duration,
    ) -> Self {
        Self {
            store,
            clock,
            retention_days,
            every,
        }
    }

    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!(
            retention_days = self.retention_days,
            every_secs = self.every.as_secs(),
            "Retention task started."
        );
        let mut ticker = interval(self.every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    let now = self.clock.now();
                    if let Err(e) = purge_check_results(self.store.as_ref(), now, self.retention_days).await {
                        error!(error = %e, "Check result retention run failed.");
                    }
                }
            }
        }
    }
}
