use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tokio::time::sleep;

use crate::config::FetchConfig;
use crate::error::FetchError;

/// Source of raw page HTML
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// HTTP fetcher with a per-request timeout and a bounded number of attempts
pub struct RequestFetcher {
    client: Client,
    retry_attempts: u32,
    retry_delay: Duration,
}

impl RequestFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self {
            client,
            retry_attempts: config.retry_attempts.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        })
    }

    async fn fetch_once(&self, url: &str) -> Result<String, FetchError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }
}

/// Client errors other than rate limiting will not change on retry
fn is_retryable(error: &FetchError) -> bool {
    match error {
        FetchError::Status { status, .. } => {
            *status == StatusCode::TOO_MANY_REQUESTS.as_u16() || *status >= 500
        }
        FetchError::Http(_) => true,
        FetchError::NoRecipe(_) => false,
    }
}

#[async_trait]
impl PageFetcher for RequestFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let mut attempt = 1;
        loop {
            debug!(
                "Fetching {} (attempt {}/{})",
                url, attempt, self.retry_attempts
            );
            match self.fetch_once(url).await {
                Ok(html) => return Ok(html),
                Err(e) if attempt < self.retry_attempts && is_retryable(&e) => {
                    warn!(
                        "Fetch of {} failed (attempt {}/{}): {}",
                        url, attempt, self.retry_attempts, e
                    );
                    // linear backoff
                    sleep(self.retry_delay * attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
