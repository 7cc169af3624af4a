//! Remote feed retrieval.
//!
//! `HttpFeedFetcher` defeats intermediate caches (a `cachebust` query
//! parameter plus no-cache headers) and retries transient failures with
//! exponential backoff, honoring `Retry-After` when the server sends one.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{header, Client, StatusCode};
use url::Url;

use crate::config::FetchConfig;
use crate::error::{AppError, AppResult};

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("invalid feed URL {0}")]
    InvalidUrl(String),

    #[error("feed responded with HTTP {0}")]
    Status(u16),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("gave up after {0} attempts")]
    Exhausted(u32),
}

#[async_trait]
pub trait FeedFetcher: Send + Sync {
    /// Retrieve the raw body of the feed at `url`.
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

pub struct HttpFeedFetcher {
    client: Client,
    max_attempts: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl HttpFeedFetcher {
    pub fn new(config: &FetchConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("ical-booking-sync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Internal(e.into()))?;

        Ok(Self {
            client,
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_secs(config.max_backoff_seconds),
        })
    }
}

/// `url` with a `cachebust=<unix millis>` query parameter appended.
pub fn cache_busted(url: &str) -> Result<Url, FetchError> {
    let mut parsed = Url::parse(url).map_err(|_| FetchError::InvalidUrl(url.to_string()))?;
    parsed
        .query_pairs_mut()
        .append_pair("cachebust", &Utc::now().timestamp_millis().to_string());
    Ok(parsed)
}

fn is_transient(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

#[async_trait]
impl FeedFetcher for HttpFeedFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let mut backoff = self.initial_backoff;

        for attempt in 1..=self.max_attempts {
            let last_attempt = attempt >= self.max_attempts;
            let request = self
                .client
                .get(cache_busted(url)?)
                .header(header::CACHE_CONTROL, "no-cache")
                .header(header::PRAGMA, "no-cache");

            let wait = match request.send().await {
                Ok(response) if response.status().is_success() => {
                    return Ok(response.text().await?);
                }
                Ok(response) if is_transient(response.status()) && !last_attempt => {
                    let wait = retry_after(&response)
                        .unwrap_or(backoff)
                        .min(self.max_backoff);
                    tracing::warn!(
                        "Transient feed error (status: {}). Retrying in {:?} (attempt {}/{})",
                        response.status(),
                        wait,
                        attempt,
                        self.max_attempts
                    );
                    wait
                }
                Ok(response) => {
                    return Err(FetchError::Status(response.status().as_u16()));
                }
                Err(e) if !last_attempt => {
                    tracing::warn!(
                        "Feed request failed: {}. Retrying in {:?} (attempt {}/{})",
                        e,
                        backoff,
                        attempt,
                        self.max_attempts
                    );
                    backoff
                }
                Err(e) => return Err(e.into()),
            };

            tokio::time::sleep(wait).await;
            backoff = std::cmp::min(backoff * 2, self.max_backoff);
        }

        Err(FetchError::Exhausted(self.max_attempts))
    }
}
