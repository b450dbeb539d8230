use dashmap::DashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    CheckWebsite { website_id: i32, attempt: u32 },
    DetectMissedHeartbeats { attempt: u32 },
}

/// Identity of a job regardless of its attempt number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKey {
    Website(i32),
    MissedHeartbeats,
}

impl Job {
    pub fn check_website(website_id: i32) -> Self {
        Job::CheckWebsite {
            website_id,
            attempt: 0,
        }
    }

    pub fn detect_missed_heartbeats() -> Self {
        Job::DetectMissedHeartbeats { attempt: 0 }
    }

    pub fn key(&self) -> JobKey {
        match self {
            Job::CheckWebsite { website_id, .. } => JobKey::Website(*website_id),
            Job::DetectMissedHeartbeats { .. } => JobKey::MissedHeartbeats,
        }
    }

    pub fn attempt(&self) -> u32 {
        match self {
            Job::CheckWebsite { attempt, .. } | Job::DetectMissedHeartbeats { attempt } => *attempt,
        }
    }

    fn next_attempt(self) -> Self {
        match self {
            Job::CheckWebsite {
                website_id,
                attempt,
            } => Job::CheckWebsite {
                website_id,
                attempt: attempt + 1,
            },
            Job::DetectMissedHeartbeats { attempt } => Job::DetectMissedHeartbeats {
                attempt: attempt + 1,
            },
        }
    }
}

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Job queue is closed")]
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobRetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for JobRetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Scheduled { attempt: u32 },
    Abandoned,
}

/// Bounded job channel. A job stays "pending" from enqueue until it completes
/// or is abandoned, and a pending job is never enqueued twice.
#[derive(Clone)]
pub struct JobQueue {
    sender: mpsc::Sender<Job>,
    pending: Arc<DashSet<JobKey>>,
    retry: JobRetryPolicy,
}

impl JobQueue {
    pub fn new(capacity: usize, retry: JobRetryPolicy) -> (Self, mpsc::Receiver<Job>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let queue = Self {
            sender,
            pending: Arc::new(DashSet::new()),
            retry,
        };
        (queue, receiver)
    }

    /// Returns `false` when the same job is already pending.
    pub async fn enqueue(&self, job: Job) -> Result<bool, QueueError> {
        if !self.pending.insert(job.key()) {
            debug!(job = ?job, "Job already pending; not enqueued again.");
            return Ok(false);
        }
        if self.sender.send(job).await.is_err() {
            self.pending.remove(&job.key());
            return Err(QueueError::Closed);
        }
        Ok(true)
    }

    pub fn complete(&self, job: &Job) {
        self.pending.remove(&job.key());
    }

    pub fn is_pending(&self, key: JobKey) -> bool {
        self.pending.contains(&key)
    }

    /// Re-queues a failed job after the fixed delay, or drops it once its
    /// retries are spent. An abandoned job is picked up again by the next scan.
    pub fn retry_later(&self, job: Job) -> RetryDecision {
        if job.attempt() >= self.retry.max_retries {
            error!(job = ?job, "Job abandoned after exhausting retries.");
            self.complete(&job);
            return RetryDecision::Abandoned;
        }

        let retried = job.next_attempt();
        let sender = self.sender.clone();
        let pending = self.pending.clone();
        let delay = self.retry.delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if sender.send(retried).await.is_err() {
                warn!(job = ?retried, "Job queue closed before retry could be queued.");
                pending.remove(&retried.key());
            }
        });
        RetryDecision::Scheduled {
            attempt: retried.attempt(),
        }
    }
}
