//! Outbound website probes.

use async_trait::async_trait;
use std::time::Duration;

pub mod http;

pub use http::HttpProber;

use crate::db::entities::uptime_check_result::FAILED_CONNECTION;

/// Outcome of one probe. Transport failures are data, not errors.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeOutcome {
    pub status_code: i32,
    pub response_time_ms: f64,
    pub error_message: Option<String>,
}

impl ProbeOutcome {
    pub fn responded(status_code: u16, response_time_ms: f64) -> Self {
        Self {
            status_code: i32::from(status_code),
            response_time_ms,
            error_message: None,
        }
    }

    pub fn failed(error: impl Into<String>, response_time_ms: f64) -> Self {
        Self {
            status_code: FAILED_CONNECTION,
            response_time_ms,
            error_message: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

#[async_trait]
pub trait WebsiteProber: Send + Sync {
    async fn probe(&self, url: &str, timeout: Duration) -> ProbeOutcome;
}
