//! In-process `MonitorStore` used for single-node runs and tests.
//!
//! A single async mutex guards all tables, which makes every operation
//! (escalation included) atomic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::alerting::escalation::{self, Escalation, EscalationPolicy};
use crate::db::entities::{
    alert, heartbeat, notification_preference, ping_log, uptime_check_result, website,
};
use crate::db::enums::{AlertKind, HeartbeatStatus, PingStatus, TargetKind};
use crate::db::store::{
    DowntimeOutcome, MonitorStore, NewCheckResult, NewHeartbeat, NewPreference, NewWebsite,
    PingMeta, PingRecord, RecoveryRecord, StoreError, DEFAULT_EXPECTED_STATUS,
};
use crate::db::target::TargetRef;
use crate::monitoring::schedule;

#[derive(Default)]
struct Tables {
    websites: BTreeMap<i32, website::Model>,
    heartbeats: BTreeMap<i32, heartbeat::Model>,
    check_results: Vec<uptime_check_result::Model>,
    ping_logs: Vec<ping_log::Model>,
    alerts: Vec<alert::Model>,
    preferences: Vec<notification_preference::Model>,
    next_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn next_small_id(&mut self) -> i32 {
        self.next_id() as i32
    }

    fn target_exists(&self, target: TargetRef) -> bool {
        match target.kind {
            TargetKind::Website => self.websites.contains_key(&target.id),
            TargetKind::Heartbeat => self.heartbeats.contains_key(&target.id),
        }
    }

    fn active_alert_index(&self, target: TargetRef, kind: AlertKind) -> Option<usize> {
        self.alerts.iter().position(|a| {
            a.is_active && a.alert_type == kind && a.target() == target
        })
    }

    fn insert_alert(
        &mut self,
        target: TargetRef,
        kind: AlertKind,
        is_active: bool,
        now: DateTime<Utc>,
    ) -> alert::Model {
        let created = alert::Model {
            id: self.next_small_id(),
            target_kind: target.kind,
            target_id: target.id,
            alert_type: kind,
            is_active,
            last_sent_at: now,
            retry_count: 1,
            created_at: now,
        };
        self.alerts.push(created.clone());
        created
    }

    fn escalate_downtime(
        &mut self,
        target: TargetRef,
        now: DateTime<Utc>,
        policy: &EscalationPolicy,
    ) -> Result<DowntimeOutcome, StoreError> {
        let index = self.active_alert_index(target, AlertKind::Downtime);
        let existing = index.map(|i| &self.alerts[i]);
        let outcome = match (escalation::decide(existing, now, policy), index) {
            (Escalation::Create, _) => {
                DowntimeOutcome::Created(self.insert_alert(target, AlertKind::Downtime, true, now))
            }
            (Escalation::Retry, Some(i)) => {
                let alert = &mut self.alerts[i];
                alert.retry_count += 1;
                alert.last_sent_at = now;
                DowntimeOutcome::Retried(alert.clone())
            }
            (Escalation::CoolingDown, Some(i)) => DowntimeOutcome::CoolingDown(self.alerts[i].clone()),
            (Escalation::Exhausted, Some(i)) => DowntimeOutcome::Exhausted(self.alerts[i].clone()),
            (decision, None) => {
                return Err(StoreError::Invalid(format!(
                    "escalation {decision:?} requires an active alert for {target}"
                )));
            }
        };
        Ok(outcome)
    }

    fn close_downtime(&mut self, target: TargetRef, now: DateTime<Utc>) -> Option<RecoveryRecord> {
        let index = self.active_alert_index(target, AlertKind::Downtime)?;
        self.alerts[index].is_active = false;
        let closed = self.alerts[index].clone();
        let recovery = self.insert_alert(target, AlertKind::Recovery, false, now);
        Some(RecoveryRecord { closed, recovery })
    }

    fn write_website_state(&mut self, website: &website::Model) -> Result<(), StoreError> {
        let stored = self
            .websites
            .get_mut(&website.id)
            .ok_or_else(|| StoreError::NotFound(format!("website {}", website.id)))?;
        stored.is_down = website.is_down;
        stored.last_downtime_at = website.last_downtime_at;
        stored.last_recovered_at = website.last_recovered_at;
        stored.next_check_at = website.next_check_at;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    failures_pending: AtomicU32,
    failing_operations: DashMap<&'static str, u32>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` operations fail with `StoreError::Unavailable`.
    pub fn fail_next(&self, count: u32) {
        self.failures_pending.store(count, Ordering::SeqCst);
    }

    /// Makes the next `count` calls of the named trait method fail with
    /// `StoreError::Unavailable`, leaving every other method working.
    pub fn fail_calls(&self, operation: &'static str, count: u32) {
        self.failing_operations.insert(operation, count);
    }

    fn check_available(&self, operation: &'static str) -> Result<(), StoreError> {
        let consumed = self
            .failures_pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if consumed.is_ok() {
            return Err(StoreError::Unavailable("injected failure".to_string()));
        }
        if let Some(mut pending) = self.failing_operations.get_mut(operation) {
            if *pending > 0 {
                *pending -= 1;
                return Err(StoreError::Unavailable(format!(
                    "injected failure in {operation}"
                )));
            }
        }
        Ok(())
    }

    pub async fn set_website_active(&self, website_id: i32, is_active: bool) {
        if let Some(website) = self.tables.lock().await.websites.get_mut(&website_id) {
            website.is_active = is_active;
        }
    }

    pub async fn alerts_for(&self, target: TargetRef) -> Vec<alert::Model> {
        self.tables
            .lock()
            .await
            .alerts
            .iter()
            .filter(|a| a.target() == target)
            .cloned()
            .collect()
    }

    pub async fn check_results_for(&self, website_id: i32) -> Vec<uptime_check_result::Model> {
        self.tables
            .lock()
            .await
            .check_results
            .iter()
            .filter(|r| r.website_id == website_id)
            .cloned()
            .collect()
    }

    pub async fn ping_logs_for(&self, heartbeat_id: i32) -> Vec<ping_log::Model> {
        self.tables
            .lock()
            .await
            .ping_logs
            .iter()
            .filter(|p| p.heartbeat_id == heartbeat_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl MonitorStore for MemoryStore {
    async fn create_website(
        &self,
        input: NewWebsite,
        now: DateTime<Utc>,
    ) -> Result<website::Model, StoreError> {
        self.check_available("create_website")?;
        let interval = input.interval()?;
        let timeout = input.timeout()?;
        let mut tables = self.tables.lock().await;
        let created = website::Model {
            id: tables.next_small_id(),
            user_id: input.user_id,
            name: input.name,
            url: input.url,
            check_interval: interval,
            expected_status: input.expected_status.unwrap_or(DEFAULT_EXPECTED_STATUS),
            timeout_ms: timeout,
            is_active: true,
            is_down: false,
            last_downtime_at: None,
            last_recovered_at: None,
            next_check_at: now,
            created_at: now,
        };
        tables.websites.insert(created.id, created.clone());
        Ok(created)
    }

    async fn create_heartbeat(
        &self,
        input: NewHeartbeat,
        now: DateTime<Utc>,
    ) -> Result<heartbeat::Model, StoreError> {
        self.check_available("create_heartbeat")?;
        let (interval, grace) = input.validated()?;
        let mut tables = self.tables.lock().await;
        let created = heartbeat::Model {
            id: tables.next_small_id(),
            user_id: input.user_id,
            name: input.name,
            key: Uuid::new_v4(),
            interval,
            grace_period: grace,
            last_ping: None,
            next_due: Some(schedule::heartbeat_next_due(now, interval, grace)),
            status: HeartbeatStatus::Unknown,
            created_at: now,
            updated_at: now,
        };
        tables.heartbeats.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_website(&self, website_id: i32) -> Result<Option<website::Model>, StoreError> {
        self.check_available("get_website")?;
        Ok(self.tables.lock().await.websites.get(&website_id).cloned())
    }

    async fn get_heartbeat(
        &self,
        heartbeat_id: i32,
    ) -> Result<Option<heartbeat::Model>, StoreError> {
        self.check_available("get_heartbeat")?;
        Ok(self.tables.lock().await.heartbeats.get(&heartbeat_id).cloned())
    }

    async fn heartbeat_by_key(&self, key: Uuid) -> Result<Option<heartbeat::Model>, StoreError> {
        self.check_available("heartbeat_by_key")?;
        Ok(self
            .tables
            .lock()
            .await
            .heartbeats
            .values()
            .find(|h| h.key == key)
            .cloned())
    }

    async fn due_websites(
        &self,
        now: DateTime<Utc>,
        after_id: Option<i32>,
        limit: u64,
    ) -> Result<Vec<website::Model>, StoreError> {
        self.check_available("due_websites")?;
        let tables = self.tables.lock().await;
        let start = after_id.map_or(i32::MIN, |id| id.saturating_add(1));
        Ok(tables
            .websites
            .range(start..)
            .map(|(_, w)| w)
            .filter(|w| w.is_active && w.next_check_at <= now)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn due_heartbeats(
        &self,
        now: DateTime<Utc>,
        after_id: Option<i32>,
        limit: u64,
    ) -> Result<Vec<heartbeat::Model>, StoreError> {
        self.check_available("due_heartbeats")?;
        let tables = self.tables.lock().await;
        let start = after_id.map_or(i32::MIN, |id| id.saturating_add(1));
        Ok(tables
            .heartbeats
            .range(start..)
            .map(|(_, h)| h)
            .filter(|h| {
                h.status == HeartbeatStatus::Up
                    && h.last_ping.is_some()
                    && h.next_due.is_some_and(|due| due < now)
            })
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn save_check_result(
        &self,
        result: NewCheckResult,
    ) -> Result<uptime_check_result::Model, StoreError> {
        self.check_available("save_check_result")?;
        let mut tables = self.tables.lock().await;
        if !tables.websites.contains_key(&result.website_id) {
            return Err(StoreError::NotFound(format!("website {}", result.website_id)));
        }
        let saved = uptime_check_result::Model {
            id: tables.next_id(),
            website_id: result.website_id,
            status_code: result.status_code,
            error_message: result.error_message,
            response_time_ms: result.response_time_ms,
            checked_at: result.checked_at,
        };
        tables.check_results.push(saved.clone());
        Ok(saved)
    }

    async fn recent_check_results(
        &self,
        website_id: i32,
        count: u64,
    ) -> Result<Vec<uptime_check_result::Model>, StoreError> {
        self.check_available("recent_check_results")?;
        let tables = self.tables.lock().await;
        let mut results: Vec<_> = tables
            .check_results
            .iter()
            .filter(|r| r.website_id == website_id)
            .cloned()
            .collect();
        results.sort_by(|a, b| b.checked_at.cmp(&a.checked_at).then(b.id.cmp(&a.id)));
        results.truncate(count as usize);
        Ok(results)
    }

    async fn save_website_state(&self, website: &website::Model) -> Result<(), StoreError> {
        self.check_available("save_website_state")?;
        self.tables.lock().await.write_website_state(website)
    }

    async fn save_website_downtime(
        &self,
        website: &website::Model,
        now: DateTime<Utc>,
        policy: &EscalationPolicy,
    ) -> Result<DowntimeOutcome, StoreError> {
        self.check_available("save_website_downtime")?;
        let mut tables = self.tables.lock().await;
        tables.write_website_state(website)?;
        tables.escalate_downtime(TargetRef::website(website.id), now, policy)
    }

    async fn save_website_recovery(
        &self,
        website: &website::Model,
        now: DateTime<Utc>,
    ) -> Result<Option<RecoveryRecord>, StoreError> {
        self.check_available("save_website_recovery")?;
        let mut tables = self.tables.lock().await;
        tables.write_website_state(website)?;
        Ok(tables.close_downtime(TargetRef::website(website.id), now))
    }

    async fn record_ping(
        &self,
        heartbeat_id: i32,
        pinged_at: DateTime<Utc>,
        next_due: DateTime<Utc>,
        meta: PingMeta,
    ) -> Result<PingRecord, StoreError> {
        self.check_available("record_ping")?;
        let mut tables = self.tables.lock().await;
        let (updated, was_down) = {
            let stored = tables
                .heartbeats
                .get_mut(&heartbeat_id)
                .ok_or_else(|| StoreError::NotFound(format!("heartbeat {heartbeat_id}")))?;
            let was_down = stored.status == HeartbeatStatus::Down;
            stored.last_ping = Some(pinged_at);
            stored.next_due = Some(next_due);
            stored.status = HeartbeatStatus::Up;
            stored.updated_at = pinged_at;
            (stored.clone(), was_down)
        };
        let log = ping_log::Model {
            id: tables.next_id(),
            heartbeat_id,
            timestamp: pinged_at,
            status: PingStatus::Success,
            runtime: meta.runtime,
            notes: meta.notes,
            ip: meta.address,
            user_agent: meta.user_agent,
        };
        tables.ping_logs.push(log);
        let recovery = if was_down {
            tables.close_downtime(TargetRef::heartbeat(heartbeat_id), pinged_at)
        } else {
            None
        };
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
        self.check_available("mark_heartbeat_missed")?;
        let mut tables = self.tables.lock().await;
        let stored = tables
            .heartbeats
            .get_mut(&heartbeat_id)
            .ok_or_else(|| StoreError::NotFound(format!("heartbeat {heartbeat_id}")))?;
        stored.status = HeartbeatStatus::Down;
        stored.updated_at = now;
        tables.escalate_downtime(TargetRef::heartbeat(heartbeat_id), now, policy)
    }

    async fn regenerate_heartbeat_key(
        &self,
        heartbeat_id: i32,
        now: DateTime<Utc>,
    ) -> Result<Uuid, StoreError> {
        self.check_available("regenerate_heartbeat_key")?;
        let mut tables = self.tables.lock().await;
        let stored = tables
            .heartbeats
            .get_mut(&heartbeat_id)
            .ok_or_else(|| StoreError::NotFound(format!("heartbeat {heartbeat_id}")))?;
        stored.key = Uuid::new_v4();
        stored.updated_at = now;
        Ok(stored.key)
    }

    async fn apply_downtime(
        &self,
        target: TargetRef,
        now: DateTime<Utc>,
        policy: &EscalationPolicy,
    ) -> Result<DowntimeOutcome, StoreError> {
        self.check_available("apply_downtime")?;
        let mut tables = self.tables.lock().await;
        if !tables.target_exists(target) {
            return Err(StoreError::NotFound(target.to_string()));
        }
        tables.escalate_downtime(target, now, policy)
    }

    async fn apply_recovery(
        &self,
        target: TargetRef,
        now: DateTime<Utc>,
    ) -> Result<Option<RecoveryRecord>, StoreError> {
        self.check_available("apply_recovery")?;
        let mut tables = self.tables.lock().await;
        if !tables.target_exists(target) {
            return Err(StoreError::NotFound(target.to_string()));
        }
        Ok(tables.close_downtime(target, now))
    }

    async fn active_alert(
        &self,
        target: TargetRef,
        kind: AlertKind,
    ) -> Result<Option<alert::Model>, StoreError> {
        self.check_available("active_alert")?;
        let tables = self.tables.lock().await;
        Ok(tables
            .active_alert_index(target, kind)
            .map(|i| tables.alerts[i].clone()))
    }

    async fn active_preferences(
        &self,
        target: TargetRef,
    ) -> Result<Vec<notification_preference::Model>, StoreError> {
        self.check_available("active_preferences")?;
        Ok(self
            .tables
            .lock()
            .await
            .preferences
            .iter()
            .filter(|p| p.is_active && p.monitor() == target)
            .cloned()
            .collect())
    }

    async fn add_preference(
        &self,
        input: NewPreference,
        now: DateTime<Utc>,
    ) -> Result<notification_preference::Model, StoreError> {
        self.check_available("add_preference")?;
        let mut tables = self.tables.lock().await;
        let duplicate = tables.preferences.iter().any(|p| {
            p.user_id == input.user_id && p.monitor() == input.target && p.method == input.method
        });
        if duplicate {
            return Err(StoreError::Conflict(format!(
                "user {} already has a {} preference for {}",
                input.user_id, input.method, input.target
            )));
        }
        let created = notification_preference::Model {
            id: tables.next_small_id(),
            user_id: input.user_id,
            target_kind: input.target.kind,
            target_id: input.target.id,
            method: input.method,
            target: input.address,
            is_active: true,
            created_at: now,
        };
        tables.preferences.push(created.clone());
        Ok(created)
    }

    async fn delete_check_results_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        self.check_available("delete_check_results_before")?;
        let mut tables = self.tables.lock().await;
        let before = tables.check_results.len();
        tables.check_results.retain(|r| r.checked_at >= cutoff);
        Ok((before - tables.check_results.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::enums::NotificationMethod;
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_new_website_is_due_immediately() {
        let store = MemoryStore::new();
        let site = store
            .create_website(NewWebsite::new(1, "https://a.example"), t0())
            .await
            .unwrap();
        assert_eq!(site.check_interval, 5);
        assert_eq!(site.expected_status, 200);
        assert_eq!(site.timeout_ms, 5000);

        let due = store.due_websites(t0(), None, 10).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, site.id);
    }

    #[tokio::test]
    async fn test_rejects_unsupported_interval() {
        let store = MemoryStore::new();
        let mut input = NewWebsite::new(1, "https://a.example");
        input.check_interval = Some(7);
        let err = store.create_website(input, t0()).await.unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
    }

    #[tokio::test]
    async fn test_due_websites_pages_and_skips_inactive() {
        let store = MemoryStore::new();
        let mut ids = Vec::new();
        for i in 0..5 {
            let site = store
                .create_website(NewWebsite::new(1, format!("https://{i}.example")), t0())
                .await
                .unwrap();
            ids.push(site.id);
        }
        store.set_website_active(ids[1], false).await;

        let first = store.due_websites(t0(), None, 2).await.unwrap();
        assert_eq!(
            first.iter().map(|w| w.id).collect::<Vec<_>>(),
            vec![ids[0], ids[2]]
        );
        let second = store
            .due_websites(t0(), first.last().map(|w| w.id), 2)
            .await
            .unwrap();
        assert_eq!(
            second.iter().map(|w| w.id).collect::<Vec<_>>(),
            vec![ids[3], ids[4]]
        );
        assert!(store
            .due_websites(t0() - Duration::seconds(1), None, 10)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_new_heartbeat_waits_interval_plus_grace() {
        let store = MemoryStore::new();
        let hb = store
            .create_heartbeat(
                NewHeartbeat {
                    user_id: 1,
                    name: "nightly".to_string(),
                    interval: 3600,
                    grace_period: None,
                },
                t0(),
            )
            .await
            .unwrap();
        assert_eq!(hb.status, HeartbeatStatus::Unknown);
        assert_eq!(hb.grace_period, 60);
        assert_eq!(hb.next_due, Some(t0() + Duration::seconds(3660)));
        // Never pinged, so never part of the due set.
        assert!(store
            .due_heartbeats(t0() + Duration::days(1), None, 10)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_single_active_downtime_alert() {
        let store = MemoryStore::new();
        let site = store
            .create_website(NewWebsite::new(1, "https://a.example"), t0())
            .await
            .unwrap();
        let target = TargetRef::website(site.id);
        let policy = EscalationPolicy::default();

        let first = store.apply_downtime(target, t0(), &policy).await.unwrap();
        assert!(matches!(first, DowntimeOutcome::Created(_)));
        let second = store
            .apply_downtime(target, t0() + Duration::minutes(1), &policy)
            .await
            .unwrap();
        assert!(matches!(second, DowntimeOutcome::CoolingDown(_)));

        let active: Vec<_> = store
            .alerts_for(target)
            .await
            .into_iter()
            .filter(|a| a.is_active && a.alert_type == AlertKind::Downtime)
            .collect();
        assert_eq!(active.len(), 1);

        let record = store
            .apply_recovery(target, t0() + Duration::minutes(2))
            .await
            .unwrap()
            .unwrap();
        assert!(!record.closed.is_active);
        assert!(!record.recovery.is_active);
        assert_eq!(record.recovery.alert_type, AlertKind::Recovery);
        assert!(store
            .active_alert(target, AlertKind::Downtime)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_duplicate_preference_conflicts() {
        let store = MemoryStore::new();
        let site = store
            .create_website(NewWebsite::new(1, "https://a.example"), t0())
            .await
            .unwrap();
        let input = NewPreference {
            user_id: 1,
            target: TargetRef::website(site.id),
            method: NotificationMethod::Email,
            address: "ops@example.com".to_string(),
        };
        store.add_preference(input.clone(), t0()).await.unwrap();
        let err = store.add_preference(input, t0()).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_injected_failures_are_consumed() {
        let store = MemoryStore::new();
        store.fail_next(2);
        assert!(store.get_website(1).await.is_err());
        assert!(store.get_website(1).await.is_err());
        assert!(store.get_website(1).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_preference_adds_keep_one_row() {
        let store = Arc::new(MemoryStore::new());
        let site = store
            .create_website(NewWebsite::new(1, "https://a.example"), t0())
            .await
            .unwrap();
        let target = TargetRef::website(site.id);
        let input = NewPreference {
            user_id: 1,
            target,
            method: NotificationMethod::Email,
            address: "ops@example.com".to_string(),
        };

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let store = store.clone();
                let input = input.clone();
                tokio::spawn(async move { store.add_preference(input, t0()).await })
            })
            .collect();
        let (mut created, mut conflicts) = (0, 0);
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => created += 1,
                Err(StoreError::Conflict(_)) => conflicts += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!((created, conflicts), (1, 1));
        assert_eq!(store.active_preferences(target).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_missed_write_changes_nothing() {
        let store = MemoryStore::new();
        let hb = store
            .create_heartbeat(
                NewHeartbeat {
                    user_id: 1,
                    name: "nightly".to_string(),
                    interval: 60,
                    grace_period: Some(0),
                },
                t0(),
            )
            .await
            .unwrap();
        let target = TargetRef::heartbeat(hb.id);
        let policy = EscalationPolicy::default();

        store.fail_calls("mark_heartbeat_missed", 1);
        assert!(store.mark_heartbeat_missed(hb.id, t0(), &policy).await.is_err());
        assert_eq!(
            store.get_heartbeat(hb.id).await.unwrap().unwrap().status,
            HeartbeatStatus::Unknown
        );
        assert!(store.alerts_for(target).await.is_empty());

        let outcome = store.mark_heartbeat_missed(hb.id, t0(), &policy).await.unwrap();
        assert!(matches!(outcome, DowntimeOutcome::Created(_)));
        assert_eq!(
            store.get_heartbeat(hb.id).await.unwrap().unwrap().status,
            HeartbeatStatus::Down
        );

        let record = store
            .record_ping(hb.id, t0() + Duration::minutes(5), t0(), PingMeta::default())
            .await
            .unwrap();
        assert_eq!(record.heartbeat.status, HeartbeatStatus::Up);
        let recovery = record.recovery.unwrap();
        assert!(!recovery.closed.is_active);
        assert_eq!(recovery.recovery.alert_type, AlertKind::Recovery);

        // Pings on a healthy heartbeat touch no alerts.
        let again = store
            .record_ping(hb.id, t0() + Duration::minutes(6), t0(), PingMeta::default())
            .await
            .unwrap();
        assert!(again.recovery.is_none());
        assert_eq!(store.alerts_for(target).await.len(), 2);
    }
}
