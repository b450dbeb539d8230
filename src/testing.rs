//! Shared doubles and wiring for unit tests.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::alerting::escalation::EscalationPolicy;
use crate::alerting::events::AlertEvent;
use crate::alerting::AlertManager;
use crate::checks::{ProbeOutcome, WebsiteProber};
use crate::clock::{Clock, ManualClock};
use crate::db::entities::{heartbeat, website};
use crate::db::enums::NotificationMethod;
use crate::db::store::{NewHeartbeat, NewPreference, NewWebsite};
use crate::db::target::TargetRef;
use crate::db::{MemoryStore, MonitorStore};
use crate::metrics::{MetricsSink, NoopMetrics};
use crate::monitoring::{HeartbeatMonitor, TargetLocks, WebsiteMonitor};
use crate::notifications::models::{RenderedMessage, RetryPolicy};
use crate::notifications::senders::{NotificationSender, SenderError, SenderRegistry};
use crate::notifications::service::NotificationDispatcher;
use crate::notifications::templates::MessageRenderer;
use crate::ratelimit::{MemoryWindowStore, RateLimiter};

pub const OWNER_EMAIL: &str = "owner@example.com";

#[derive(Debug, Clone)]
pub struct SentMessage {
    pub address: String,
    pub message: RenderedMessage,
    pub event: AlertEvent,
}

#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<SentMessage>>,
}

impl RecordingSender {
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSender for RecordingSender {
    async fn send(
        &self,
        address: &str,
        message: &RenderedMessage,
        event: &AlertEvent,
    ) -> Result<(), SenderError> {
        self.sent.lock().unwrap().push(SentMessage {
            address: address.to_string(),
            message: message.clone(),
            event: event.clone(),
        });
        Ok(())
    }
}

/// Always fails, either with a retryable or a permanent error.
pub struct FailingSender {
    permanent: bool,
    calls: AtomicU32,
}

impl FailingSender {
    pub fn transient() -> Self {
        Self {
            permanent: false,
            calls: AtomicU32::new(0),
        }
    }

    pub fn permanent() -> Self {
        Self {
            permanent: true,
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationSender for FailingSender {
    async fn send(
        &self,
        _address: &str,
        _message: &RenderedMessage,
        _event: &AlertEvent,
    ) -> Result<(), SenderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.permanent {
            Err(SenderError::Rejected {
                provider: "test",
                status: 401,
                body: "unauthorized".to_string(),
            })
        } else {
            Err(SenderError::SendFailed("provider unavailable".to_string()))
        }
    }
}

/// Replays a fixed list of status codes; the last one repeats. Status 0 is a
/// connection failure.
pub struct ScriptedProber {
    script: Mutex<VecDeque<i32>>,
    last: Mutex<i32>,
    calls: AtomicU32,
}

impl ScriptedProber {
    pub fn new(statuses: impl IntoIterator<Item = i32>) -> Self {
        Self {
            script: Mutex::new(statuses.into_iter().collect()),
            last: Mutex::new(200),
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WebsiteProber for ScriptedProber {
    async fn probe(&self, _url: &str, _timeout: Duration) -> ProbeOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut last = self.last.lock().unwrap();
        if let Some(next) = self.script.lock().unwrap().pop_front() {
            *last = next;
        }
        match u16::try_from(*last) {
            Ok(status) if status > 0 => ProbeOutcome::responded(status, 42.0),
            _ => ProbeOutcome::failed("connection refused", 3.0),
        }
    }
}

pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub store: Arc<MemoryStore>,
    pub sender: Arc<RecordingSender>,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub alerts: Arc<AlertManager>,
    pub limiter: Arc<RateLimiter>,
    pub locks: Arc<TargetLocks>,
    pub metrics: Arc<dyn MetricsSink>,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Routes `method` to `sender`; every other method records.
    pub fn with_sender_for(method: NotificationMethod, sender: Arc<FailingSender>) -> Self {
        Self::build(Some((method, sender)))
    }

    fn build(override_sender: Option<(NotificationMethod, Arc<FailingSender>)>) -> Self {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap(),
        ));
        let store = Arc::new(MemoryStore::new());
        let sender = Arc::new(RecordingSender::default());
        let metrics: Arc<dyn MetricsSink> = Arc::new(NoopMetrics);

        let mut registry = SenderRegistry::new();
        for method in [
            NotificationMethod::Email,
            NotificationMethod::Slack,
            NotificationMethod::Webhook,
            NotificationMethod::Whatsapp,
        ] {
            registry.register(method, sender.clone());
        }
        if let Some((method, failing)) = override_sender {
            registry.register(method, failing);
        }

        let dispatcher = Arc::new(NotificationDispatcher::new(
            store.clone(),
            registry,
            MessageRenderer::new("https://alivechecks.test/dashboard"),
            RetryPolicy {
                max_retries: 3,
                base_delay: Duration::from_millis(1),
                send_timeout: Duration::from_secs(1),
            },
            metrics.clone(),
        ));
        let alerts = Arc::new(AlertManager::new(
            store.clone(),
            dispatcher.clone(),
            EscalationPolicy::default(),
            metrics.clone(),
        ));
        let limiter = Arc::new(RateLimiter::new(
            Arc::new(MemoryWindowStore::new()),
            clock.clone(),
        ));

        Self {
            clock,
            store,
            sender,
            dispatcher,
            alerts,
            limiter,
            locks: Arc::new(TargetLocks::new()),
            metrics,
        }
    }

    pub async fn website(&self, url: &str) -> website::Model {
        self.store
            .create_website(NewWebsite::new(1, url), self.clock.now())
            .await
            .unwrap()
    }

    pub async fn website_with_email(&self, url: &str) -> website::Model {
        let site = self.website(url).await;
        self.email_owner(TargetRef::website(site.id)).await;
        site
    }

    pub async fn heartbeat(&self, interval: i32, grace_period: i32) -> heartbeat::Model {
        self.store
            .create_heartbeat(
                NewHeartbeat {
                    user_id: 1,
                    name: "nightly-backup".to_string(),
                    interval,
                    grace_period: Some(grace_period),
                },
                self.clock.now(),
            )
            .await
            .unwrap()
    }

    pub async fn heartbeat_with_email(&self, interval: i32, grace_period: i32) -> heartbeat::Model {
        let hb = self.heartbeat(interval, grace_period).await;
        self.email_owner(TargetRef::heartbeat(hb.id)).await;
        hb
    }

    async fn email_owner(&self, target: TargetRef) {
        self.store
            .add_preference(
                NewPreference {
                    user_id: 1,
                    target,
                    method: NotificationMethod::Email,
                    address: OWNER_EMAIL.to_string(),
                },
                self.clock.now(),
            )
            .await
            .unwrap();
    }

    pub fn website_monitor(&self, prober: Arc<ScriptedProber>) -> WebsiteMonitor {
        WebsiteMonitor::new(
            self.store.clone(),
            prober,
            self.alerts.clone(),
            self.locks.clone(),
            self.clock.clone(),
            self.metrics.clone(),
        )
    }

    pub fn heartbeat_monitor(&self) -> HeartbeatMonitor {
        HeartbeatMonitor::new(
            self.store.clone(),
            self.limiter.clone(),
            self.alerts.clone(),
            self.locks.clone(),
            self.clock.clone(),
            self.metrics.clone(),
            2,
        )
    }
}
