use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::debug;

use super::{ProbeOutcome, WebsiteProber};
use crate::version;

/// Issues a GET and reports the status code, or 0 when no response arrived.
pub struct HttpProber {
    client: Client,
}

impl HttpProber {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = Client::builder().user_agent(version::user_agent()).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl WebsiteProber for HttpProber {
    async fn probe(&self, url: &str, timeout: Duration) -> ProbeOutcome {
        let start_time = Instant::now();
        let result = self.client.get(url).timeout(timeout).send().await;
        let response_time_ms = start_time.elapsed().as_secs_f64() * 1000.0;

        match result {
            Ok(response) => ProbeOutcome::responded(response.status().as_u16(), response_time_ms),
            Err(e) => {
                let error_details = if e.is_timeout() {
                    format!("Request timed out after {}ms", timeout.as_millis())
                } else {
                    e.to_string()
                };
                debug!(url, error = %error_details, "Website probe failed.");
                ProbeOutcome::failed(error_details, response_time_ms)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_refused_connection_reports_zero() {
        let prober = HttpProber::new().unwrap();
        let outcome = prober
            .probe("http://127.0.0.1:1/", Duration::from_secs(2))
            .await;
        assert_eq!(outcome.status_code, 0);
        assert!(!outcome.is_success());
        assert!(outcome.error_message.is_some());
        assert!(outcome.response_time_ms >= 0.0);
    }

    #[tokio::test]
    async fn test_malformed_url_reports_zero() {
        let prober = HttpProber::new().unwrap();
        let outcome = prober.probe("not a url", Duration::from_secs(1)).await;
        assert_eq!(outcome.status_code, 0);
    }

    #[test]
    fn test_only_2xx_is_success() {
        assert!(ProbeOutcome::responded(204, 1.0).is_success());
        assert!(!ProbeOutcome::responded(302, 1.0).is_success());
        assert!(!ProbeOutcome::responded(503, 1.0).is_success());
    }
}
