//! Periodic due-set scans feeding the job queue.

use futures::TryStreamExt;
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

pub mod queue;
pub mod worker;

pub use self::queue::{Job, JobQueue, JobRetryPolicy};
pub use self::worker::{JobHandler, MonitorJobs, WorkerPool};

use self::queue::QueueError;
use crate::clock::Clock;
use crate::db::store::{MonitorStore, StoreError};
use crate::monitoring::due;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}

#[derive(Debug, Clone, Copy)]
pub struct ScanSettings {
    pub website_scan_every: Duration,
    pub heartbeat_scan_every: Duration,
    pub page_size: u64,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            website_scan_every: Duration::from_secs(60),
            heartbeat_scan_every: Duration::from_secs(60),
            page_size: 100,
        }
    }
}

pub struct Scheduler {
    store: Arc<dyn MonitorStore>,
    queue: JobQueue,
    clock: Arc<dyn Clock>,
    settings: ScanSettings,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn MonitorStore>,
        queue: JobQueue,
        clock: Arc<dyn Clock>,
        settings: ScanSettings,
    ) -> Self {
        Self {
            store,
            queue,
            clock,
            settings,
        }
    }

    /// Enqueues a check for every due website. Returns how many were new.
    pub async fn enqueue_due_websites(&self) -> Result<usize, SchedulerError> {
        let now = self.clock.now();
        let mut due = pin!(due::due_websites(
            self.store.clone(),
            now,
            self.settings.page_size
        ));
        let mut enqueued = 0;
        while let Some(website) = due.try_next().await? {
            if self.queue.enqueue(Job::check_website(website.id)).await? {
                enqueued += 1;
            }
        }
        Ok(enqueued)
    }

    pub async fn enqueue_missed_heartbeat_scan(&self) -> Result<bool, SchedulerError> {
        Ok(self.queue.enqueue(Job::detect_missed_heartbeats()).await?)
    }

    /// Runs both scan loops until `shutdown` flips or its sender is dropped.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!(
            website_scan_secs = self.settings.website_scan_every.as_secs(),
            heartbeat_scan_secs = self.settings.heartbeat_scan_every.as_secs(),
            "Scheduler started."
        );
        let mut website_tick = interval(self.settings.website_scan_every);
        website_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut heartbeat_tick = interval(self.settings.heartbeat_scan_every);
        heartbeat_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = website_tick.tick() => {
                    match self.enqueue_due_websites().await {
                        Ok(enqueued) => debug!(enqueued, "Website scan finished."),
                        Err(e) => error!(error = %e, "Website scan failed."),
                    }
                }
                _ = heartbeat_tick.tick() => {
                    if let Err(e) = self.enqueue_missed_heartbeat_scan().await {
                        error!(error = %e, "Failed to enqueue missed heartbeat scan.");
                    }
                }
            }
        }
        info!("Scheduler stopped.");
    }
}
