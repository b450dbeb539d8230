//! Downtime and recovery alert lifecycle.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

pub mod escalation;
pub mod events;

use self::escalation::EscalationPolicy;
use self::events::AlertEvent;
use crate::db::enums::AlertKind;
use crate::db::store::{DowntimeOutcome, MonitorStore, RecoveryRecord, StoreError};
use crate::db::target::{Monitor, TargetRef};
use crate::metrics::MetricsSink;
use crate::notifications::service::NotificationDispatcher;

#[derive(Error, Debug)]
pub enum AlertError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertOutcome {
    Created,
    Retried { retry_count: i32 },
    CoolingDown,
    Exhausted,
    Recovered,
    NothingToRecover,
}

impl AlertOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertOutcome::Created => "created",
            AlertOutcome::Retried { .. } => "retried",
            AlertOutcome::CoolingDown => "cooling_down",
            AlertOutcome::Exhausted => "exhausted",
            AlertOutcome::Recovered => "recovered",
            AlertOutcome::NothingToRecover => "nothing_to_recover",
        }
    }
}

pub struct AlertManager {
    store: Arc<dyn MonitorStore>,
    dispatcher: Arc<NotificationDispatcher>,
    policy: EscalationPolicy,
    metrics: Arc<dyn MetricsSink>,
}

impl AlertManager {
    pub fn new(
        store: Arc<dyn MonitorStore>,
        dispatcher: Arc<NotificationDispatcher>,
        policy: EscalationPolicy,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            store,
            dispatcher,
            policy,
            metrics,
        }
    }

    pub fn policy(&self) -> &EscalationPolicy {
        &self.policy
    }

    /// Opens, re-sends or holds the downtime alert of `target`.
    pub async fn handle_downtime(
        &self,
        target: TargetRef,
        now: DateTime<Utc>,
    ) -> Result<AlertOutcome, AlertError> {
        let applied = self.store.apply_downtime(target, now, &self.policy).await?;
        Ok(self.announce_downtime(target, now, &applied).await)
    }

    /// Closes the open downtime alert of `target`, if any, and announces the recovery.
    pub async fn handle_recovery(
        &self,
        target: TargetRef,
        now: DateTime<Utc>,
    ) -> Result<AlertOutcome, AlertError> {
        let record = self.store.apply_recovery(target, now).await?;
        Ok(self.announce_recovery(target, now, record.as_ref()).await)
    }

    /// Notifies for a downtime escalation the store has already committed.
    pub async fn announce_downtime(
        &self,
        target: TargetRef,
        now: DateTime<Utc>,
        applied: &DowntimeOutcome,
    ) -> AlertOutcome {
        let alert = applied.alert();
        let outcome = match applied {
            DowntimeOutcome::Created(_) => AlertOutcome::Created,
            DowntimeOutcome::Retried(a) => AlertOutcome::Retried {
                retry_count: a.retry_count,
            },
            DowntimeOutcome::CoolingDown(_) => AlertOutcome::CoolingDown,
            DowntimeOutcome::Exhausted(_) => AlertOutcome::Exhausted,
        };

        if applied.dispatches() {
            info!(
                monitor = %target,
                alert_id = alert.id,
                retry_count = alert.retry_count,
                "Sending downtime alert."
            );
            self.dispatch(
                target,
                AlertKind::Downtime,
                now,
                alert.created_at,
                alert.retry_count,
            )
            .await;
        } else {
            debug!(
                monitor = %target,
                alert_id = alert.id,
                outcome = outcome.as_str(),
                "Downtime alert not re-sent."
            );
        }

        self.metrics.alert_outcome(target, outcome.as_str());
        outcome
    }

    /// Notifies for a recovery the store has already committed. `None` means
    /// no downtime alert was open.
    pub async fn announce_recovery(
        &self,
        target: TargetRef,
        now: DateTime<Utc>,
        record: Option<&RecoveryRecord>,
    ) -> AlertOutcome {
        let outcome = match record {
            Some(record) => {
                info!(
                    monitor = %target,
                    closed_alert_id = record.closed.id,
                    recovery_alert_id = record.recovery.id,
                    "Sending recovery alert."
                );
                self.dispatch(
                    target,
                    AlertKind::Recovery,
                    now,
                    record.closed.created_at,
                    record.closed.retry_count,
                )
                .await;
                AlertOutcome::Recovered
            }
            None => {
                debug!(monitor = %target, "No open downtime alert to recover.");
                AlertOutcome::NothingToRecover
            }
        };
        self.metrics.alert_outcome(target, outcome.as_str());
        outcome
    }

    async fn dispatch(
        &self,
        target: TargetRef,
        kind: AlertKind,
        now: DateTime<Utc>,
        incident_started_at: DateTime<Utc>,
        retry_count: i32,
    ) {
        let monitor = match self.store.get_monitor(target).await {
            Ok(Some(monitor)) => monitor,
            Ok(None) => {
                warn!(monitor = %target, "Monitor vanished before its alert could be sent.");
                return;
            }
            Err(e) => {
                error!(monitor = %target, error = %e, "Failed to load monitor for alert.");
                return;
            }
        };

        let last_status_code = match &monitor {
            Monitor::Website(w) => match self.store.recent_check_results(w.id, 1).await {
                Ok(results) => results.first().map(|r| r.status_code),
                Err(e) => {
                    warn!(monitor = %target, error = %e, "Could not load the latest check result.");
                    None
                }
            },
            Monitor::Heartbeat(_) => None,
        };

        let event = AlertEvent::new(
            &monitor,
            kind,
            now,
            incident_started_at,
            retry_count,
            last_status_code,
        );
        match self.dispatcher.notify(&event).await {
            Ok(submitted) => {
                debug!(monitor = %target, kind = %kind, submitted, "Alert deliveries submitted.")
            }
            Err(e) => {
                error!(monitor = %target, kind = %kind, error = %e, "Failed to submit alert deliveries.")
            }
        }
    }
}
