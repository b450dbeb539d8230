use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::alerting::escalation::EscalationPolicy;
use crate::notifications::models::RetryPolicy;
use crate::notifications::senders::email::SmtpSettings;
use crate::notifications::senders::whatsapp::{WhatsAppSettings, GRAPH_API_BASE};
use crate::scheduler::{JobRetryPolicy, ScanSettings};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse TOML from config file at {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("Failed to load config from environment: {0}")]
    Env(#[from] envy::Error),
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Deserialize, Debug, Clone)]
pub struct ServerConfig {
    pub database_url: String,
    pub redis_url: Option<String>,
    pub log_dir: String,
    pub worker_count: usize,
    pub scan_interval_seconds: u64,
    pub heartbeat_scan_interval_seconds: u64,
    pub retention_days: i64,
    pub retention_interval_hours: u64,
    pub alert_max_retries: i32,
    pub alert_retry_interval_minutes: i64,
    pub delivery_max_retries: u32,
    pub delivery_base_delay_seconds: u64,
    pub delivery_timeout_seconds: u64,
    pub job_retry_delay_seconds: u64,
    pub job_max_retries: u32,
    pub due_page_size: u64,
    pub dashboard_url: String,
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_from: Option<String>,
    pub whatsapp_token: Option<String>,
    pub whatsapp_phone_number_id: Option<String>,
    pub whatsapp_api_base: String,
}

// Partial config for layering
#[derive(Deserialize, Default, Debug)]
pub struct PartialServerConfig {
    database_url: Option<String>,
    redis_url: Option<String>,
    log_dir: Option<String>,
    worker_count: Option<usize>,
    scan_interval_seconds: Option<u64>,
    heartbeat_scan_interval_seconds: Option<u64>,
    retention_days: Option<i64>,
    retention_interval_hours: Option<u64>,
    alert_max_retries: Option<i32>,
    alert_retry_interval_minutes: Option<i64>,
    delivery_max_retries: Option<u32>,
    delivery_base_delay_seconds: Option<u64>,
    delivery_timeout_seconds: Option<u64>,
    job_retry_delay_seconds: Option<u64>,
    job_max_retries: Option<u32>,
    due_page_size: Option<u64>,
    dashboard_url: Option<String>,
    smtp_host: Option<String>,
    smtp_port: Option<u16>,
    smtp_username: Option<String>,
    smtp_password: Option<String>,
    smtp_from: Option<String>,
    whatsapp_token: Option<String>,
    whatsapp_phone_number_id: Option<String>,
    whatsapp_api_base: Option<String>,
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_dashboard_url() -> String {
    "https://alivechecks.com/dashboard".to_string()
}

impl PartialServerConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}

fn positive<T: PartialOrd + Default + std::fmt::Display>(
    key: &'static str,
    value: T,
) -> Result<T, ConfigError> {
    if value > T::default() {
        Ok(value)
    } else {
        Err(ConfigError::Invalid {
            key,
            reason: format!("must be positive, got {value}"),
        })
    }
}

impl ServerConfig {
    /// `.env`, then the optional TOML file, with environment variables taking precedence.
    pub fn load(config_path: Option<&str>) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let file_config = match config_path {
            Some(path) => PartialServerConfig::from_file(Path::new(path))?,
            None => PartialServerConfig::default(),
        };
        let env_config: PartialServerConfig = envy::from_env::<PartialServerConfig>()?;

        Self::merge(file_config, env_config)
    }

    /// Environment overrides file; anything unset in both falls back to its default.
    pub fn merge(
        file: PartialServerConfig,
        env: PartialServerConfig,
    ) -> Result<Self, ConfigError> {
        let config = ServerConfig {
            database_url: env
                .database_url
                .or(file.database_url)
                .ok_or(ConfigError::Missing("DATABASE_URL"))?,
            redis_url: env.redis_url.or(file.redis_url).filter(|url| !url.is_empty()),
            log_dir: env.log_dir.or(file.log_dir).unwrap_or_else(default_log_dir),
            worker_count: positive(
                "worker_count",
                env.worker_count.or(file.worker_count).unwrap_or(8),
            )?,
            scan_interval_seconds: positive(
                "scan_interval_seconds",
                env.scan_interval_seconds
                    .or(file.scan_interval_seconds)
                    .unwrap_or(60),
            )?,
            heartbeat_scan_interval_seconds: positive(
                "heartbeat_scan_interval_seconds",
                env.heartbeat_scan_interval_seconds
                    .or(file.heartbeat_scan_interval_seconds)
                    .unwrap_or(60),
            )?,
            retention_days: positive(
                "retention_days",
                env.retention_days.or(file.retention_days).unwrap_or(90),
            )?,
            retention_interval_hours: positive(
                "retention_interval_hours",
                env.retention_interval_hours
                    .or(file.retention_interval_hours)
                    .unwrap_or(24),
            )?,
            alert_max_retries: positive(
                "alert_max_retries",
                env.alert_max_retries.or(file.alert_max_retries).unwrap_or(3),
            )?,
            alert_retry_interval_minutes: positive(
                "alert_retry_interval_minutes",
                env.alert_retry_interval_minutes
                    .or(file.alert_retry_interval_minutes)
                    .unwrap_or(10),
            )?,
            delivery_max_retries: env
                .delivery_max_retries
                .or(file.delivery_max_retries)
                .unwrap_or(3),
            delivery_base_delay_seconds: env
                .delivery_base_delay_seconds
                .or(file.delivery_base_delay_seconds)
                .unwrap_or(30),
            delivery_timeout_seconds: positive(
                "delivery_timeout_seconds",
                env.delivery_timeout_seconds
                    .or(file.delivery_timeout_seconds)
                    .unwrap_or(10),
            )?,
            job_retry_delay_seconds: env
                .job_retry_delay_seconds
                .or(file.job_retry_delay_seconds)
                .unwrap_or(10),
            job_max_retries: env.job_max_retries.or(file.job_max_retries).unwrap_or(3),
            due_page_size: positive(
                "due_page_size",
                env.due_page_size.or(file.due_page_size).unwrap_or(100),
            )?,
            dashboard_url: env
                .dashboard_url
                .or(file.dashboard_url)
                .unwrap_or_else(default_dashboard_url),
            smtp_host: env.smtp_host.or(file.smtp_host),
            smtp_port: env.smtp_port.or(file.smtp_port).unwrap_or(587),
            smtp_username: env.smtp_username.or(file.smtp_username),
            smtp_password: env.smtp_password.or(file.smtp_password),
            smtp_from: env.smtp_from.or(file.smtp_from),
            whatsapp_token: env.whatsapp_token.or(file.whatsapp_token),
            whatsapp_phone_number_id: env
                .whatsapp_phone_number_id
                .or(file.whatsapp_phone_number_id),
            whatsapp_api_base: env
                .whatsapp_api_base
                .or(file.whatsapp_api_base)
                .unwrap_or_else(|| GRAPH_API_BASE.to_string()),
        };
        Ok(config)
    }

    pub fn escalation_policy(&self) -> EscalationPolicy {
        EscalationPolicy {
            max_retries: self.alert_max_retries,
            retry_interval: chrono::Duration::minutes(self.alert_retry_interval_minutes),
        }
    }

    pub fn delivery_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.delivery_max_retries,
            base_delay: Duration::from_secs(self.delivery_base_delay_seconds),
            send_timeout: self.delivery_timeout(),
        }
    }

    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_secs(self.delivery_timeout_seconds)
    }

    pub fn job_retry_policy(&self) -> JobRetryPolicy {
        JobRetryPolicy {
            max_retries: self.job_max_retries,
            delay: Duration::from_secs(self.job_retry_delay_seconds),
        }
    }

    pub fn scan_settings(&self) -> ScanSettings {
        ScanSettings {
            website_scan_every: Duration::from_secs(self.scan_interval_seconds),
            heartbeat_scan_every: Duration::from_secs(self.heartbeat_scan_interval_seconds),
            page_size: self.due_page_size,
        }
    }

    pub fn retention_every(&self) -> Duration {
        Duration::from_secs(self.retention_interval_hours.saturating_mul(3600))
    }

    /// `None` unless both a host and a sender address are configured.
    pub fn smtp_settings(&self) -> Option<SmtpSettings> {
        Some(SmtpSettings {
            host: self.smtp_host.clone()?,
            port: self.smtp_port,
            username: self.smtp_username.clone(),
            password: self.smtp_password.clone(),
            from: self.smtp_from.clone()?,
        })
    }

    pub fn whatsapp_settings(&self) -> Option<WhatsAppSettings> {
        Some(WhatsAppSettings {
            token: self.whatsapp_token.clone()?,
            phone_number_id: self.whatsapp_phone_number_id.clone()?,
            api_base: self.whatsapp_api_base.clone(),
            dashboard_url: self.dashboard_url.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn with_database() -> PartialServerConfig {
        PartialServerConfig {
            database_url: Some("postgres://localhost/alivechecks".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::merge(with_database(), PartialServerConfig::default()).unwrap();
        assert_eq!(config.log_dir, "logs");
        assert_eq!(config.worker_count, 8);
        assert_eq!(config.retention_days, 90);
        assert_eq!(config.smtp_port, 587);
        assert_eq!(config.dashboard_url, "https://alivechecks.com/dashboard");
        assert_eq!(config.escalation_policy(), EscalationPolicy::default());
        assert_eq!(config.delivery_policy(), RetryPolicy::default());
        assert_eq!(config.job_retry_policy(), JobRetryPolicy::default());
        assert!(config.redis_url.is_none());
        assert!(config.smtp_settings().is_none());
        assert!(config.whatsapp_settings().is_none());
    }

    #[test]
    fn test_environment_overrides_file() {
        let file = PartialServerConfig {
            worker_count: Some(2),
            log_dir: Some("/var/log/alivechecks".to_string()),
            ..with_database()
        };
        let env = PartialServerConfig {
            worker_count: Some(16),
            ..Default::default()
        };
        let config = ServerConfig::merge(file, env).unwrap();
        assert_eq!(config.worker_count, 16);
        assert_eq!(config.log_dir, "/var/log/alivechecks");
    }

    #[test]
    fn test_database_url_is_required() {
        let err = ServerConfig::merge(
            PartialServerConfig::default(),
            PartialServerConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DATABASE_URL")));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let env = PartialServerConfig {
            worker_count: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            ServerConfig::merge(with_database(), env),
            Err(ConfigError::Invalid {
                key: "worker_count",
                ..
            })
        ));
    }

    #[test]
    fn test_toml_file_is_read() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
database_url = "postgres://db/alivechecks"
redis_url = "redis://127.0.0.1:6379"
smtp_host = "smtp.example.com"
smtp_from = "alerts@example.com"
retention_days = 30
"#
        )
        .unwrap();

        let partial = PartialServerConfig::from_file(file.path()).unwrap();
        let config = ServerConfig::merge(partial, PartialServerConfig::default()).unwrap();
        assert_eq!(config.database_url, "postgres://db/alivechecks");
        assert_eq!(config.redis_url.as_deref(), Some("redis://127.0.0.1:6379"));
        assert_eq!(config.retention_days, 30);
        let smtp = config.smtp_settings().unwrap();
        assert_eq!(smtp.host, "smtp.example.com");
        assert_eq!(smtp.port, 587);
    }

    #[test]
    fn test_missing_file_is_empty_and_bad_toml_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = PartialServerConfig::from_file(&dir.path().join("absent.toml")).unwrap();
        assert!(missing.database_url.is_none());

        let bad = dir.path().join("bad.toml");
        fs::write(&bad, "worker_count = \"many\"").unwrap();
        assert!(matches!(
            PartialServerConfig::from_file(&bad),
            Err(ConfigError::Parse { .. })
        ));
    }
}
