use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::queue::{Job, JobQueue, RetryDecision};
use crate::monitoring::{HeartbeatMonitor, MonitorError, WebsiteMonitor};

#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &Job) -> Result<(), MonitorError>;
}

/// Routes jobs to the website and heartbeat monitors.
pub struct MonitorJobs {
    websites: Arc<WebsiteMonitor>,
    heartbeats: Arc<HeartbeatMonitor>,
}

impl MonitorJobs {
    pub fn new(websites: Arc<WebsiteMonitor>, heartbeats: Arc<HeartbeatMonitor>) -> Self {
        Self {
            websites,
            heartbeats,
        }
    }
}

#[async_trait]
impl JobHandler for MonitorJobs {
    async fn handle(&self, job: &Job) -> Result<(), MonitorError> {
        match job {
            Job::CheckWebsite { website_id, .. } => {
                self.websites.check_website(*website_id).await?;
            }
            Job::DetectMissedHeartbeats { .. } => {
                self.heartbeats.detect_missed().await?;
            }
        }
        Ok(())
    }
}

/// Fixed set of tasks draining one shared receiver.
pub struct WorkerPool {
    queue: JobQueue,
    receiver: Arc<Mutex<mpsc::Receiver<Job>>>,
    handler: Arc<dyn JobHandler>,
    size: usize,
}

impl WorkerPool {
    pub fn new(
        queue: JobQueue,
        receiver: mpsc::Receiver<Job>,
        handler: Arc<dyn JobHandler>,
        size: usize,
    ) -> Self {
        Self {
            queue,
            receiver: Arc::new(Mutex::new(receiver)),
            handler,
            size: size.max(1),
        }
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        info!(workers = self.size, "Starting job workers.");
        (0..self.size)
            .map(|worker_id| {
                let worker = Worker {
                    id: worker_id,
                    queue: self.queue.clone(),
                    receiver: self.receiver.clone(),
                    handler: self.handler.clone(),
                };
                tokio::spawn(worker.run(shutdown.clone()))
            })
            .collect()
    }
}

struct Worker {
    id: usize,
    queue: JobQueue,
    receiver: Arc<Mutex<mpsc::Receiver<Job>>>,
    handler: Arc<dyn JobHandler>,
}

impl Worker {
    async fn next_job(&self) -> Option<Job> {
        self.receiver.lock().await.recv().await
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                break;
            }
            let job = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                job = self.next_job() => job,
            };
            let Some(job) = job else {
                break;
            };

            match self.handler.handle(&job).await {
                Ok(()) => {
                    debug!(worker = self.id, job = ?job, "Job finished.");
                    self.queue.complete(&job);
                }
                Err(e) => match self.queue.retry_later(job) {
                    RetryDecision::Scheduled { attempt } => {
                        warn!(worker = self.id, job = ?job, attempt, error = %e, "Job failed; retry scheduled.");
                    }
                    RetryDecision::Abandoned => {
                        warn!(worker = self.id, job = ?job, error = %e, "Job failed and was abandoned.");
                    }
                },
            }
        }
        debug!(worker = self.id, "Worker stopped.");
    }
}
