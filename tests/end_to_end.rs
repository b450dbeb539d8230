use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alivechecks::alerting::escalation::EscalationPolicy;
use alivechecks::alerting::events::AlertEvent;
use alivechecks::alerting::AlertManager;
use alivechecks::checks::{ProbeOutcome, WebsiteProber};
use alivechecks::clock::{Clock, ManualClock};
use alivechecks::db::enums::{AlertKind, NotificationMethod};
use alivechecks::db::store::{NewPreference, NewWebsite};
use alivechecks::db::{MemoryStore, MonitorStore, TargetRef};
use alivechecks::metrics::NoopMetrics;
use alivechecks::monitoring::{MonitorError, TargetLocks, Transition, WebsiteMonitor};
use alivechecks::notifications::senders::{NotificationSender, SenderError, SenderRegistry};
use alivechecks::notifications::templates::MessageRenderer;
use alivechecks::notifications::{NotificationDispatcher, RenderedMessage, RetryPolicy};
use alivechecks::scheduler::queue::JobKey;
use alivechecks::scheduler::{Job, JobHandler, JobQueue, JobRetryPolicy, WorkerPool};

struct Outage {
    statuses: Mutex<VecDeque<i32>>,
}

#[async_trait]
impl WebsiteProber for Outage {
    async fn probe(&self, _url: &str, _timeout: Duration) -> ProbeOutcome {
        match self.statuses.lock().unwrap().pop_front() {
            Some(status) if status > 0 => ProbeOutcome::responded(status as u16, 20.0),
            _ => ProbeOutcome::failed("connection timed out", 5000.0),
        }
    }
}

#[derive(Default)]
struct Inbox {
    received: Mutex<Vec<(String, AlertKind)>>,
}

#[async_trait]
impl NotificationSender for Inbox {
    async fn send(
        &self,
        address: &str,
        _message: &RenderedMessage,
        event: &AlertEvent,
    ) -> Result<(), SenderError> {
        self.received
            .lock()
            .unwrap()
            .push((address.to_string(), event.kind));
        Ok(())
    }
}

struct World {
    clock: Arc<ManualClock>,
    store: Arc<MemoryStore>,
    inbox: Arc<Inbox>,
    dispatcher: Arc<NotificationDispatcher>,
    monitor: WebsiteMonitor,
}

fn world(statuses: &[i32]) -> World {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 11, 4, 6, 0, 0).unwrap(),
    ));
    let store = Arc::new(MemoryStore::new());
    let inbox = Arc::new(Inbox::default());

    let mut registry = SenderRegistry::new();
    registry.register(NotificationMethod::Email, inbox.clone());
    registry.register(NotificationMethod::Slack, inbox.clone());
    let dispatcher = Arc::new(NotificationDispatcher::new(
        store.clone(),
        registry,
        MessageRenderer::new("https://alivechecks.test/dashboard"),
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(1),
            send_timeout: Duration::from_secs(1),
        },
        Arc::new(NoopMetrics),
    ));
    let alerts = Arc::new(AlertManager::new(
        store.clone(),
        dispatcher.clone(),
        EscalationPolicy::default(),
        Arc::new(NoopMetrics),
    ));
    let monitor = WebsiteMonitor::new(
        store.clone(),
        Arc::new(Outage {
            statuses: Mutex::new(statuses.iter().copied().collect()),
        }),
        alerts,
        Arc::new(TargetLocks::new()),
        clock.clone(),
        Arc::new(NoopMetrics),
    );

    World {
        clock,
        store,
        inbox,
        dispatcher,
        monitor,
    }
}

async fn watched_site(world: &World) -> TargetRef {
    let site = world
        .store
        .create_website(NewWebsite::new(42, "https://api.example.com/health"), world.clock.now())
        .await
        .unwrap();
    let target = TargetRef::website(site.id);
    for (method, address) in [
        (NotificationMethod::Email, "ops@example.com"),
        (NotificationMethod::Slack, "https://hooks.slack.example/T0/B0"),
    ] {
        world
            .store
            .add_preference(
                NewPreference {
                    user_id: 42,
                    target,
                    method,
                    address: address.to_string(),
                },
                world.clock.now(),
            )
            .await
            .unwrap();
    }
    target
}

#[tokio::test]
async fn outage_then_recovery_notifies_each_channel_once() {
    let world = world(&[0, 503, 0, 200]);
    let target = watched_site(&world).await;

    let mut transitions = Vec::new();
    for _ in 0..3 {
        let report = world.monitor.check_website(target.id).await.unwrap().unwrap();
        transitions.push(report.transition);
        world.clock.advance(ChronoDuration::minutes(1));
    }
    assert_eq!(
        transitions,
        vec![Transition::Unchanged, Transition::Unchanged, Transition::WentDown]
    );
    world.dispatcher.wait_idle().await;

    let active = world
        .store
        .active_alert(target, AlertKind::Downtime)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(active.retry_count, 1);
    let mut downtime: Vec<_> = world.inbox.received.lock().unwrap().clone();
    downtime.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(
        downtime,
        vec![
            ("https://hooks.slack.example/T0/B0".to_string(), AlertKind::Downtime),
            ("ops@example.com".to_string(), AlertKind::Downtime),
        ]
    );

    let report = world.monitor.check_website(target.id).await.unwrap().unwrap();
    assert_eq!(report.transition, Transition::Recovered);
    world.dispatcher.wait_idle().await;

    assert!(world
        .store
        .active_alert(target, AlertKind::Downtime)
        .await
        .unwrap()
        .is_none());
    let received = world.inbox.received.lock().unwrap().clone();
    let recoveries = received
        .iter()
        .filter(|(_, kind)| *kind == AlertKind::Recovery)
        .count();
    assert_eq!(received.len(), 4);
    assert_eq!(recoveries, 2);

    let website = world.store.get_website(target.id).await.unwrap().unwrap();
    assert!(!website.is_down);
    assert!(website.last_recovered_at.is_some());
}

#[tokio::test]
async fn worker_pool_drives_checks_from_the_queue() {
    let world = world(&[500, 500, 500]);
    let target = watched_site(&world).await;
    let World {
        store,
        dispatcher,
        monitor,
        inbox,
        ..
    } = world;

    struct ChecksOnly(WebsiteMonitor);

    #[async_trait]
    impl JobHandler for ChecksOnly {
        async fn handle(&self, job: &Job) -> Result<(), MonitorError> {
            if let Job::CheckWebsite { website_id, .. } = job {
                self.0.check_website(*website_id).await?;
            }
            Ok(())
        }
    }

    let (queue, receiver) = JobQueue::new(8, JobRetryPolicy::default());
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let workers =
        WorkerPool::new(queue.clone(), receiver, Arc::new(ChecksOnly(monitor)), 1).spawn(shutdown_rx);

    for _ in 0..3 {
        queue.enqueue(Job::check_website(target.id)).await.unwrap();
        while queue.is_pending(JobKey::Website(target.id)) {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }
    dispatcher.wait_idle().await;

    assert!(store.get_website(target.id).await.unwrap().unwrap().is_down);
    assert_eq!(inbox.received.lock().unwrap().len(), 2);

    shutdown_tx.send(true).unwrap();
    for worker in workers {
        worker.await.unwrap();
    }
}
