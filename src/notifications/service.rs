use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use super::models::{RenderedMessage, RetryPolicy};
use super::senders::{NotificationSender, SenderError, SenderRegistry};
use super::templates::MessageRenderer;
use crate::alerting::events::AlertEvent;
use crate::db::entities::notification_preference;
use crate::db::store::{MonitorStore, StoreError};
use crate::metrics::MetricsSink;

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Templating error: {0}")]
    Template(#[from] tera::Error),
}

/// Fans alert events out to every active preference of the target. Each
/// delivery runs as its own task with its own retries.
pub struct NotificationDispatcher {
    store: Arc<dyn MonitorStore>,
    senders: SenderRegistry,
    renderer: MessageRenderer,
    policy: RetryPolicy,
    metrics: Arc<dyn MetricsSink>,
    tasks: Mutex<JoinSet<()>>,
}

impl NotificationDispatcher {
    pub fn new(
        store: Arc<dyn MonitorStore>,
        senders: SenderRegistry,
        renderer: MessageRenderer,
        policy: RetryPolicy,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            store,
            senders,
            renderer,
            policy,
            metrics,
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    /// Submits one delivery per active preference and returns how many were submitted.
    pub async fn notify(&self, event: &AlertEvent) -> Result<usize, NotificationError> {
        let preferences = self.store.active_preferences(event.target).await?;
        if preferences.is_empty() {
            info!(monitor = %event.target, kind = %event.kind, "No active notification preferences.");
            return Ok(0);
        }
        let message = self.renderer.render(event)?;

        let mut tasks = self.tasks.lock().await;
        // Reap finished deliveries so the set does not grow without bound.
        while tasks.try_join_next().is_some() {}

        let mut submitted = 0;
        for preference in preferences {
            let Some(sender) = self.senders.get(preference.method) else {
                warn!(
                    preference_id = preference.id,
                    method = %preference.method,
                    "No sender configured for notification method; skipping."
                );
                self.metrics.delivery_finished(preference.method, false, 0);
                continue;
            };
            let delivery = Delivery {
                sender,
                preference,
                message: message.clone(),
                event: event.clone(),
                policy: self.policy,
                metrics: self.metrics.clone(),
            };
            tasks.spawn(delivery.run());
            submitted += 1;
        }
        Ok(submitted)
    }

    /// Waits until every submitted delivery has finished.
    pub async fn wait_idle(&self) {
        loop {
            let mut pending = std::mem::take(&mut *self.tasks.lock().await);
            if pending.is_empty() {
                return;
            }
            while let Some(joined) = pending.join_next().await {
                if let Err(e) = joined {
                    error!(error = %e, "Notification delivery task failed.");
                }
            }
        }
    }
}

struct Delivery {
    sender: Arc<dyn NotificationSender>,
    preference: notification_preference::Model,
    message: RenderedMessage,
    event: AlertEvent,
    policy: RetryPolicy,
    metrics: Arc<dyn MetricsSink>,
}

impl Delivery {
    async fn attempt(&self) -> Result<(), SenderError> {
        let send = self
            .sender
            .send(&self.preference.target, &self.message, &self.event);
        match tokio::time::timeout(self.policy.send_timeout, send).await {
            Ok(result) => result,
            Err(_) => Err(SenderError::TimedOut(self.policy.send_timeout)),
        }
    }

    async fn run(self) {
        let method = self.preference.method;
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let error = match self.attempt().await {
                Ok(()) => {
                    info!(
                        preference_id = self.preference.id,
                        method = %method,
                        monitor = %self.event.target,
                        kind = %self.event.kind,
                        attempts,
                        "Notification delivered."
                    );
                    self.metrics.delivery_finished(method, true, attempts);
                    return;
                }
                Err(e) => e,
            };

            if error.is_permanent() {
                error!(
                    preference_id = self.preference.id,
                    method = %method,
                    error = %error,
                    "Notification rejected permanently; not retrying."
                );
                break;
            }
            if attempts > self.policy.max_retries {
                error!(
                    preference_id = self.preference.id,
                    method = %method,
                    attempts,
                    error = %error,
                    "Notification dropped after exhausting retries."
                );
                break;
            }

            let delay = self.policy.delay_for(attempts);
            warn!(
                preference_id = self.preference.id,
                method = %method,
                attempt = attempts,
                retry_in_ms = delay.as_millis() as u64,
                error = %error,
                "Notification delivery failed; retrying."
            );
            tokio::time::sleep(delay).await;
        }
        self.metrics.delivery_finished(method, false, attempts);
    }
}
