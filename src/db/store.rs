//! The persistence seam used by the monitoring engine.
//!
//! `DbStore` runs on PostgreSQL through sea-orm; `MemoryStore` keeps the same
//! contract in process. Escalation writes are atomic per target in both, and a
//! state change that raises or closes an alert commits together with it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr, SqlErr, TransactionTrait};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::alerting::escalation::{self, Escalation, EscalationPolicy};
use crate::db::entities::{
    alert, heartbeat, notification_preference, uptime_check_result, website,
};
use crate::db::enums::{AlertKind, HeartbeatStatus, NotificationMethod, PingStatus, TargetKind};
use crate::db::services;
use crate::db::target::{Monitor, TargetRef};
use crate::monitoring::schedule;

/// Poll intervals, in minutes, a website may be created with.
pub const WEBSITE_INTERVAL_CHOICES: [i32; 6] = [1, 5, 10, 15, 30, 60];
pub const DEFAULT_WEBSITE_INTERVAL: i32 = 5;
pub const DEFAULT_EXPECTED_STATUS: i32 = 200;
pub const DEFAULT_TIMEOUT_MS: i32 = 5000;
pub const DEFAULT_GRACE_PERIOD: i32 = 60;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(DbErr),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Invalid input: {0}")]
    Invalid(String),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<DbErr> for StoreError {
    fn from(err: DbErr) -> Self {
        if let Some(SqlErr::UniqueConstraintViolation(detail)) = err.sql_err() {
            return StoreError::Conflict(detail);
        }
        match err {
            DbErr::RecordNotFound(what) => StoreError::NotFound(what),
            other => StoreError::Database(other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewWebsite {
    pub user_id: i32,
    pub name: Option<String>,
    pub url: String,
    pub check_interval: Option<i32>,
    pub expected_status: Option<i32>,
    pub timeout_ms: Option<i32>,
}

impl NewWebsite {
    pub fn new(user_id: i32, url: impl Into<String>) -> Self {
        Self {
            user_id,
            name: None,
            url: url.into(),
            check_interval: None,
            expected_status: None,
            timeout_ms: None,
        }
    }

    pub(crate) fn interval(&self) -> Result<i32, StoreError> {
        let interval = self.check_interval.unwrap_or(DEFAULT_WEBSITE_INTERVAL);
        if !WEBSITE_INTERVAL_CHOICES.contains(&interval) {
            return Err(StoreError::Invalid(format!(
                "check interval must be one of {WEBSITE_INTERVAL_CHOICES:?} minutes, got {interval}"
            )));
        }
        Ok(interval)
    }

    pub(crate) fn timeout(&self) -> Result<i32, StoreError> {
        let timeout = self.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS);
        if timeout <= 0 {
            return Err(StoreError::Invalid(format!(
                "timeout must be positive, got {timeout}ms"
            )));
        }
        Ok(timeout)
    }
}

#[derive(Debug, Clone)]
pub struct NewHeartbeat {
    pub user_id: i32,
    pub name: String,
    /// Seconds between expected pings.
    pub interval: i32,
    pub grace_period: Option<i32>,
}

impl NewHeartbeat {
    pub(crate) fn validated(&self) -> Result<(i32, i32), StoreError> {
        let grace = self.grace_period.unwrap_or(DEFAULT_GRACE_PERIOD);
        if self.interval <= 0 {
            return Err(StoreError::Invalid(format!(
                "heartbeat interval must be positive, got {}",
                self.interval
            )));
        }
        if grace < 0 {
            return Err(StoreError::Invalid(format!(
                "grace period cannot be negative, got {grace}"
            )));
        }
        Ok((self.interval, grace))
    }
}

#[derive(Debug, Clone)]
pub struct NewPreference {
    pub user_id: i32,
    pub target: TargetRef,
    pub method: NotificationMethod,
    pub address: String,
}

#[derive(Debug, Clone)]
pub struct NewCheckResult {
    pub website_id: i32,
    pub status_code: i32,
    pub error_message: Option<String>,
    pub response_time_ms: f64,
    pub checked_at: DateTime<Utc>,
}

/// Caller metadata attached to an accepted ping.
#[derive(Debug, Clone, Default)]
pub struct PingMeta {
    pub address: Option<String>,
    pub user_agent: Option<String>,
    pub notes: Option<String>,
    pub runtime: Option<f64>,
}

/// Result of one atomic downtime evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum DowntimeOutcome {
    Created(alert::Model),
    Retried(alert::Model),
    CoolingDown(alert::Model),
    Exhausted(alert::Model),
}

impl DowntimeOutcome {
    pub fn alert(&self) -> &alert::Model {
        match self {
            DowntimeOutcome::Created(a)
            | DowntimeOutcome::Retried(a)
            | DowntimeOutcome::CoolingDown(a)
            | DowntimeOutcome::Exhausted(a) => a,
        }
    }

    pub fn dispatches(&self) -> bool {
        matches!(
            self,
            DowntimeOutcome::Created(_) | DowntimeOutcome::Retried(_)
        )
    }
}

/// The downtime alert a recovery closed and the recovery alert it created.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryRecord {
    pub closed: alert::Model,
    pub recovery: alert::Model,
}

/// An accepted ping and the recovery it caused, if the heartbeat was down.
#[derive(Debug, Clone, PartialEq)]
pub struct PingRecord {
    pub heartbeat: heartbeat::Model,
    pub recovery: Option<RecoveryRecord>,
}

#[async_trait]
pub trait MonitorStore: Send + Sync {
    async fn create_website(
        &self,
        input: NewWebsite,
        now: DateTime<Utc>,
    ) -> Result<website::Model, StoreError>;

    async fn create_heartbeat(
        &self,
        input: NewHeartbeat,
        now: DateTime<Utc>,
    ) -> Result<heartbeat::Model, StoreError>;

    async fn get_website(&self, website_id: i32) -> Result<Option<website::Model>, StoreError>;

    async fn get_heartbeat(&self, heartbeat_id: i32)
        -> Result<Option<heartbeat::Model>, StoreError>;

    async fn heartbeat_by_key(&self, key: Uuid) -> Result<Option<heartbeat::Model>, StoreError>;

    async fn get_monitor(&self, target: TargetRef) -> Result<Option<Monitor>, StoreError> {
        Ok(match target.kind {
            TargetKind::Website => self.get_website(target.id).await?.map(Monitor::Website),
            TargetKind::Heartbeat => self.get_heartbeat(target.id).await?.map(Monitor::Heartbeat),
        })
    }

    /// One keyset page of due websites, ordered by id.
    async fn due_websites(
        &self,
        now: DateTime<Utc>,
        after_id: Option<i32>,
        limit: u64,
    ) -> Result<Vec<website::Model>, StoreError>;

    /// One keyset page of heartbeats whose `next_due` is strictly before `now`.
    async fn due_heartbeats(
        &self,
        now: DateTime<Utc>,
        after_id: Option<i32>,
        limit: u64,
    ) -> Result<Vec<heartbeat::Model>, StoreError>;

    async fn save_check_result(
        &self,
        result: NewCheckResult,
    ) -> Result<uptime_check_result::Model, StoreError>;

    /// Newest first.
    async fn recent_check_results(
        &self,
        website_id: i32,
        count: u64,
    ) -> Result<Vec<uptime_check_result::Model>, StoreError>;

    async fn save_website_state(&self, website: &website::Model) -> Result<(), StoreError>;

    /// Saves the website state and escalates its downtime alert in one transaction.
    async fn save_website_downtime(
        &self,
        website: &website::Model,
        now: DateTime<Utc>,
        policy: &EscalationPolicy,
    ) -> Result<DowntimeOutcome, StoreError>;

    /// Saves the website state and closes its downtime alert in one transaction.
    async fn save_website_recovery(
        &self,
        website: &website::Model,
        now: DateTime<Utc>,
    ) -> Result<Option<RecoveryRecord>, StoreError>;

    /// Marks the heartbeat up with the given due time and appends a success ping
    /// log. A heartbeat that was down has its downtime alert closed in the same
    /// transaction.
    async fn record_ping(
        &self,
        heartbeat_id: i32,
        pinged_at: DateTime<Utc>,
        next_due: DateTime<Utc>,
        meta: PingMeta,
    ) -> Result<PingRecord, StoreError>;

    /// Marks the heartbeat down and escalates its downtime alert in one transaction.
    async fn mark_heartbeat_missed(
        &self,
        heartbeat_id: i32,
        now: DateTime<Utc>,
        policy: &EscalationPolicy,
    ) -> Result<DowntimeOutcome, StoreError>;

    async fn regenerate_heartbeat_key(
        &self,
        heartbeat_id: i32,
        now: DateTime<Utc>,
    ) -> Result<Uuid, StoreError>;

    async fn apply_downtime(
        &self,
        target: TargetRef,
        now: DateTime<Utc>,
        policy: &EscalationPolicy,
    ) -> Result<DowntimeOutcome, StoreError>;

    /// Returns `None` when no downtime alert was open.
    async fn apply_recovery(
        &self,
        target: TargetRef,
        now: DateTime<Utc>,
    ) -> Result<Option<RecoveryRecord>, StoreError>;

    async fn active_alert(
        &self,
        target: TargetRef,
        kind: AlertKind,
    ) -> Result<Option<alert::Model>, StoreError>;

    async fn active_preferences(
        &self,
        target: TargetRef,
    ) -> Result<Vec<notification_preference::Model>, StoreError>;

    async fn add_preference(
        &self,
        input: NewPreference,
        now: DateTime<Utc>,
    ) -> Result<notification_preference::Model, StoreError>;

    async fn delete_check_results_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;
}

#[derive(Clone)]
pub struct DbStore {
    db: DatabaseConnection,
}

impl DbStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

/// Takes the row lock that serializes escalation for one target.
async fn lock_target<C: ConnectionTrait>(txn: &C, target: TargetRef) -> Result<(), DbErr> {
    match target.kind {
        TargetKind::Website => services::lock_website(txn, target.id).await.map(|_| ()),
        TargetKind::Heartbeat => services::lock_heartbeat(txn, target.id).await.map(|_| ()),
    }
}

/// Creates or advances the downtime alert of an already locked target.
async fn escalate_downtime<C: ConnectionTrait>(
    txn: &C,
    target: TargetRef,
    now: DateTime<Utc>,
    policy: &EscalationPolicy,
) -> Result<DowntimeOutcome, StoreError> {
    let existing = services::get_active_alert(txn, target, AlertKind::Downtime).await?;
    let outcome = match (escalation::decide(existing.as_ref(), now, policy), existing) {
        (Escalation::Create, _) => DowntimeOutcome::Created(
            services::insert_alert(txn, target, AlertKind::Downtime, true, now).await?,
        ),
        (Escalation::Retry, Some(existing)) => {
            DowntimeOutcome::Retried(services::bump_alert_retry(txn, &existing, now).await?)
        }
        (Escalation::CoolingDown, Some(existing)) => DowntimeOutcome::CoolingDown(existing),
        (Escalation::Exhausted, Some(existing)) => DowntimeOutcome::Exhausted(existing),
        (decision, None) => {
            return Err(StoreError::Invalid(format!(
                "escalation {decision:?} requires an active alert for {target}"
            )));
        }
    };
    debug!(monitor = %target, outcome = ?outcome, "Applied downtime escalation.");
    Ok(outcome)
}

/// Closes the downtime alert of an already locked target and records the recovery.
async fn close_downtime<C: ConnectionTrait>(
    txn: &C,
    target: TargetRef,
    now: DateTime<Utc>,
) -> Result<Option<RecoveryRecord>, StoreError> {
    let Some(existing) = services::get_active_alert(txn, target, AlertKind::Downtime).await? else {
        return Ok(None);
    };
    let closed = services::deactivate_alert(txn, &existing).await?;
    let recovery = services::insert_alert(txn, target, AlertKind::Recovery, false, now).await?;
    Ok(Some(RecoveryRecord { closed, recovery }))
}

#[async_trait]
impl MonitorStore for DbStore {
    async fn create_website(
        &self,
        input: NewWebsite,
        now: DateTime<Utc>,
    ) -> Result<website::Model, StoreError> {
        let interval = input.interval()?;
        let timeout = input.timeout()?;
        let created = services::create_website(
            &self.db,
            input.user_id,
            input.name,
            input.url,
            interval,
            input.expected_status.unwrap_or(DEFAULT_EXPECTED_STATUS),
            timeout,
            now,
        )
        .await?;
        Ok(created)
    }

    async fn create_heartbeat(
        &self,
        input: NewHeartbeat,
        now: DateTime<Utc>,
    ) -> Result<heartbeat::Model, StoreError> {
        let (interval, grace) = input.validated()?;
        let created = services::create_heartbeat(
            &self.db,
            input.user_id,
            input.name,
            interval,
            grace,
            schedule::heartbeat_next_due(now, interval, grace),
            now,
        )
        .await?;
        Ok(created)
    }

    async fn get_website(&self, website_id: i32) -> Result<Option<website::Model>, StoreError> {
        Ok(services::get_website_by_id(&self.db, website_id).await?)
    }

    async fn get_heartbeat(
        &self,
        heartbeat_id: i32,
    ) -> Result<Option<heartbeat::Model>, StoreError> {
        Ok(services::get_heartbeat_by_id(&self.db, heartbeat_id).await?)
    }

    async fn heartbeat_by_key(&self, key: Uuid) -> Result<Option<heartbeat::Model>, StoreError> {
        Ok(services::get_heartbeat_by_key(&self.db, key).await?)
    }

    async fn due_websites(
        &self,
        now: DateTime<Utc>,
        after_id: Option<i32>,
        limit: u64,
    ) -> Result<Vec<website::Model>, StoreError> {
        Ok(services::get_due_websites(&self.db, now, after_id, limit).await?)
    }

    async fn due_heartbeats(
        &self,
        now: DateTime<Utc>,
        after_id: Option<i32>,
        limit: u64,
    ) -> Result<Vec<heartbeat::Model>, StoreError> {
        Ok(services::get_overdue_heartbeats(&self.db, now, after_id, limit).await?)
    }

    async fn save_check_result(
        &self,
        result: NewCheckResult,
    ) -> Result<uptime_check_result::Model, StoreError> {
        let saved = services::insert_check_result(
            &self.db,
            result.website_id,
            result.status_code,
            result.error_message,
            result.response_time_ms,
            result.checked_at,
        )
        .await?;
        Ok(saved)
    }

    async fn recent_check_results(
        &self,
        website_id: i32,
        count: u64,
    ) -> Result<Vec<uptime_check_result::Model>, StoreError> {
        Ok(services::get_recent_check_results(&self.db, website_id, count).await?)
    }

    async fn save_website_state(&self, website: &website::Model) -> Result<(), StoreError> {
        services::update_website_state(&self.db, website).await?;
        Ok(())
    }

    async fn save_website_downtime(
        &self,
        website: &website::Model,
        now: DateTime<Utc>,
        policy: &EscalationPolicy,
    ) -> Result<DowntimeOutcome, StoreError> {
        let txn = self.db.begin().await?;
        services::lock_website(&txn, website.id).await?;
        services::update_website_state(&txn, website).await?;
        let outcome =
            escalate_downtime(&txn, TargetRef::website(website.id), now, policy).await?;
        txn.commit().await?;
        Ok(outcome)
    }

    async fn save_website_recovery(
        &self,
        website: &website::Model,
        now: DateTime<Utc>,
    ) -> Result<Option<RecoveryRecord>, StoreError> {
        let txn = self.db.begin().await?;
        services::lock_website(&txn, website.id).await?;
        services::update_website_state(&txn, website).await?;
        let record = close_downtime(&txn, TargetRef::website(website.id), now).await?;
        txn.commit().await?;
        Ok(record)
    }

    async fn record_ping(
        &self,
        heartbeat_id: i32,
        pinged_at: DateTime<Utc>,
        next_due: DateTime<Utc>,
        meta: PingMeta,
    ) -> Result<PingRecord, StoreError> {
        let txn = self.db.begin().await?;
        let previous = services::lock_heartbeat(&txn, heartbeat_id).await?;
        let updated = services::mark_heartbeat_up(&txn, heartbeat_id, pinged_at, next_due).await?;
        services::insert_ping_log(
            &txn,
            heartbeat_id,
            pinged_at,
            PingStatus::Success,
            meta.runtime,
            meta.notes,
            meta.address,
            meta.user_agent,
        )
        .await?;
        let recovery = if previous.status == HeartbeatStatus::Down {
            close_downtime(&txn, TargetRef::heartbeat(heartbeat_id), pinged_at).await?
        } else {
            None
        };
        txn.commit().await?;
        Ok(PingRecord {
            heartbeat: updated,
            recovery,
        })
    }

    async fn mark_heartbeat_missed(
        &self,
        heartbeat_id: i32,
        now: DateTime<Utc>,
        policy: &EscalationPolicy,
    ) -> Result<DowntimeOutcome, StoreError> {
        let txn = self.db.begin().await?;
        services::lock_heartbeat(&txn, heartbeat_id).await?;
        services::mark_heartbeat_down(&txn, heartbeat_id, now).await?;
        let outcome =
            escalate_downtime(&txn, TargetRef::heartbeat(heartbeat_id), now, policy).await?;
        txn.commit().await?;
        Ok(outcome)
    }

    async fn regenerate_heartbeat_key(
        &self,
        heartbeat_id: i32,
        now: DateTime<Utc>,
    ) -> Result<Uuid, StoreError> {
        let key = Uuid::new_v4();
        services::set_heartbeat_key(&self.db, heartbeat_id, key, now).await?;
        Ok(key)
    }

    async fn apply_downtime(
        &self,
        target: TargetRef,
        now: DateTime<Utc>,
        policy: &EscalationPolicy,
    ) -> Result<DowntimeOutcome, StoreError> {
        let txn = self.db.begin().await?;
        lock_target(&txn, target).await?;
        let outcome = escalate_downtime(&txn, target, now, policy).await?;
        txn.commit().await?;
        Ok(outcome)
    }

    async fn apply_recovery(
        &self,
        target: TargetRef,
        now: DateTime<Utc>,
    ) -> Result<Option<RecoveryRecord>, StoreError> {
        let txn = self.db.begin().await?;
        lock_target(&txn, target).await?;
        let record = close_downtime(&txn, target, now).await?;
        txn.commit().await?;
        Ok(record)
    }

    async fn active_alert(
        &self,
        target: TargetRef,
        kind: AlertKind,
    ) -> Result<Option<alert::Model>, StoreError> {
        Ok(services::get_active_alert(&self.db, target, kind).await?)
    }

    async fn active_preferences(
        &self,
        target: TargetRef,
    ) -> Result<Vec<notification_preference::Model>, StoreError> {
        Ok(services::get_active_preferences(&self.db, target).await?)
    }

    async fn add_preference(
        &self,
        input: NewPreference,
        now: DateTime<Utc>,
    ) -> Result<notification_preference::Model, StoreError> {
        let txn = self.db.begin().await?;
        // Serializes concurrent adds for the same monitor. A unique violation
        // raised by the database still surfaces as `Conflict`.
        lock_target(&txn, input.target).await?;
        if services::find_preference(&txn, input.user_id, input.target, input.method)
            .await?
            .is_some()
        {
            return Err(StoreError::Conflict(format!(
                "user {} already has a {} preference for {}",
                input.user_id, input.method, input.target
            )));
        }
        let created = services::insert_preference(
            &txn,
            input.user_id,
            input.target,
            input.method,
            input.address,
            now,
        )
        .await?;
        txn.commit().await?;
        Ok(created)
    }

    async fn delete_check_results_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        Ok(services::delete_check_results_before(&self.db, cutoff).await?)
    }
}
