//! Wires the stores, monitors and notification stack from a `ServerConfig`.

use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use super::config::ServerConfig;
use crate::alerting::AlertManager;
use crate::checks::HttpProber;
use crate::clock::Clock;
use crate::db::enums::NotificationMethod;
use crate::db::store::MonitorStore;
use crate::metrics::MetricsSink;
use crate::monitoring::{HeartbeatMonitor, TargetLocks, WebsiteMonitor};
use crate::notifications::senders::email::EmailSender;
use crate::notifications::senders::slack::SlackSender;
use crate::notifications::senders::webhook::WebhookSender;
use crate::notifications::senders::whatsapp::WhatsAppSender;
use crate::notifications::senders::{SenderError, SenderRegistry};
use crate::notifications::service::NotificationDispatcher;
use crate::notifications::templates::MessageRenderer;
use crate::ratelimit::{MemoryWindowStore, RateLimiter, RedisWindowStore, WindowStore};
use crate::scheduler::MonitorJobs;

#[derive(Error, Debug)]
pub enum ServiceInitError {
    #[error("Failed to set up notification sender: {0}")]
    Sender(#[from] SenderError),
    #[error("Failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Slack and webhook are always available; email and WhatsApp only with credentials.
pub fn build_sender_registry(config: &ServerConfig) -> Result<SenderRegistry, SenderError> {
    let timeout = config.delivery_timeout();
    let mut registry = SenderRegistry::new();
    registry.register(NotificationMethod::Slack, Arc::new(SlackSender::new(timeout)?));
    registry.register(
        NotificationMethod::Webhook,
        Arc::new(WebhookSender::new(timeout)?),
    );

    match config.smtp_settings() {
        Some(smtp) => registry.register(
            NotificationMethod::Email,
            Arc::new(EmailSender::new(&smtp, timeout)?),
        ),
        None => warn!("SMTP is not configured; email notifications are disabled."),
    }
    match config.whatsapp_settings() {
        Some(whatsapp) => registry.register(
            NotificationMethod::Whatsapp,
            Arc::new(WhatsAppSender::new(whatsapp, timeout)?),
        ),
        None => warn!("WhatsApp is not configured; WhatsApp notifications are disabled."),
    }
    Ok(registry)
}

/// Redis when configured and reachable at startup, otherwise process-local.
pub fn build_window_store(config: &ServerConfig) -> Arc<dyn WindowStore> {
    match config.redis_url.as_deref() {
        Some(url) => match RedisWindowStore::new(url) {
            Ok(store) => {
                info!("Using Redis for heartbeat rate limiting.");
                Arc::new(store)
            }
            Err(e) => {
                warn!(error = %e, "Invalid Redis URL; falling back to in-memory rate limiting.");
                Arc::new(MemoryWindowStore::new())
            }
        },
        None => Arc::new(MemoryWindowStore::new()),
    }
}

pub struct CoreServices {
    pub store: Arc<dyn MonitorStore>,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub alerts: Arc<AlertManager>,
    pub websites: Arc<WebsiteMonitor>,
    pub heartbeats: Arc<HeartbeatMonitor>,
}

impl CoreServices {
    pub fn new(
        config: &ServerConfig,
        store: Arc<dyn MonitorStore>,
        clock: Arc<dyn Clock>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Result<Self, ServiceInitError> {
        let registry = build_sender_registry(config)?;
        info!(methods = ?registry.methods(), "Notification senders ready.");

        let dispatcher = Arc::new(NotificationDispatcher::new(
            store.clone(),
            registry,
            MessageRenderer::new(config.dashboard_url.clone()),
            config.delivery_policy(),
            metrics.clone(),
        ));
        let alerts = Arc::new(AlertManager::new(
            store.clone(),
            dispatcher.clone(),
            config.escalation_policy(),
            metrics.clone(),
        ));
        let locks = Arc::new(TargetLocks::new());

        let websites = Arc::new(WebsiteMonitor::new(
            store.clone(),
            Arc::new(HttpProber::new()?),
            alerts.clone(),
            locks.clone(),
            clock.clone(),
            metrics.clone(),
        ));
        let limiter = Arc::new(RateLimiter::new(build_window_store(config), clock.clone()));
        let heartbeats = Arc::new(HeartbeatMonitor::new(
            store.clone(),
            limiter,
            alerts.clone(),
            locks,
            clock,
            metrics,
            config.due_page_size,
        ));

        Ok(Self {
            store,
            dispatcher,
            alerts,
            websites,
            heartbeats,
        })
    }

    pub fn job_handler(&self) -> Arc<MonitorJobs> {
        Arc::new(MonitorJobs::new(
            self.websites.clone(),
            self.heartbeats.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::db::MemoryStore;
    use crate::metrics::NoopMetrics;
    use crate::server::config::PartialServerConfig;

    fn config(toml: &str) -> ServerConfig {
        let file: PartialServerConfig = toml::from_str(toml).unwrap();
        ServerConfig::merge(file, PartialServerConfig::default()).unwrap()
    }

    #[test]
    fn test_unconfigured_channels_are_left_out() {
        let registry =
            build_sender_registry(&config(r#"database_url = "postgres://db/a""#)).unwrap();
        assert_eq!(
            registry.methods(),
            vec![NotificationMethod::Slack, NotificationMethod::Webhook]
        );
    }

    #[tokio::test]
    async fn test_all_channels_with_credentials() {
        let registry = build_sender_registry(&config(
            r#"
database_url = "postgres://db/a"
smtp_host = "smtp.example.com"
smtp_from = "Alerts <alerts@example.com>"
whatsapp_token = "token"
whatsapp_phone_number_id = "1234567"
"#,
        ))
        .unwrap();
        assert_eq!(registry.methods().len(), 4);
        assert!(registry.get(NotificationMethod::Whatsapp).is_some());
    }

    #[tokio::test]
    async fn test_core_services_build_without_redis() {
        let services = CoreServices::new(
            &config(r#"database_url = "postgres://db/a""#),
            Arc::new(MemoryStore::new()),
            Arc::new(SystemClock),
            Arc::new(NoopMetrics),
        )
        .unwrap();
        assert_eq!(services.heartbeats.detect_missed().await.unwrap(), 0);
    }
}
