//! Ransomware feed client
//!
//! Fetches one year of incidents as a JSON array. Transient failures are
//! retried according to the configured [`RetryPolicy`](crate::retry::RetryPolicy);
//! whatever survives the retries is returned as an error and callers decide
//! how to degrade.

use crate::config::FeedConfig;
use crate::error::{Result, SyncError};
use ransomsync_common::RawRecord;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

const USER_AGENT: &str = concat!("ransomsync/", env!("CARGO_PKG_VERSION"));

/// HTTP client for the incident feed
pub struct FeedClient {
    client: Client,
    config: FeedConfig,
}

/// Outcome of one HTTP attempt
enum Attempt {
    Done(Vec<u8>),
    Retry(SyncError),
    Fail(SyncError),
}

impl FeedClient {
    /// Create a new client with configuration
    pub fn new(config: FeedConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self { client, config })
    }

    /// Fetch every incident the feed lists for `year`.
    ///
    /// Elements of the array that are not objects are skipped.
    pub async fn fetch_year(&self, year: i32) -> Result<Vec<RawRecord>> {
        let url = self.config.year_url(year);
        info!(%url, year, "Fetching incidents from feed");

        let body = self.get_with_retry(&url).await?;
        let records = decode_records(&body)?;

        info!(year, count = records.len(), "Fetched incidents");
        Ok(records)
    }

    /// GET `url`, retrying transport errors and retryable statuses
    async fn get_with_retry(&self, url: &str) -> Result<Vec<u8>> {
        let policy = &self.config.retry;
        let mut attempt = 1;

        loop {
            let error = match self.get_once(url).await {
                Attempt::Done(body) => return Ok(body),
                Attempt::Fail(e) => return Err(e),
                Attempt::Retry(e) => e,
            };

            if !policy.should_retry(attempt) {
                warn!(
                    "Feed request failed after {} attempt(s): {}",
                    attempt, error
                );
                return Err(error);
            }

            let backoff = policy.backoff_for(attempt);
            warn!(
                "Feed attempt {}/{} failed: {}; retrying in {:?}",
                attempt, policy.max_attempts, error, backoff
            );
            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }

    async fn get_once(&self, url: &str) -> Attempt {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => return Attempt::Retry(SyncError::Http(e)),
        };

        let status = response.status();
        if !status.is_success() {
            let error = SyncError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            };
            return if self.config.retry.is_retryable_status(status.as_u16()) {
                Attempt::Retry(error)
            } else {
                Attempt::Fail(error)
            };
        }

        match response.bytes().await {
            Ok(bytes) => {
                debug!(bytes = bytes.len(), "Received feed payload");
                Attempt::Done(bytes.to_vec())
            },
            Err(e) => Attempt::Retry(SyncError::Http(e)),
        }
    }
}

/// Decode a feed payload into raw records
pub fn decode_records(body: &[u8]) -> Result<Vec<RawRecord>> {
    let payload: Value =
        serde_json::from_slice(body).map_err(|e| SyncError::Decode(e.to_string()))?;

    let Value::Array(items) = payload else {
        return Err(SyncError::Decode("expected a JSON array of incidents".to_string()));
    };

    let mut records = Vec::with_capacity(items.len());
    let mut skipped = 0usize;
    for item in items {
        match RawRecord::from_value(item).map_err(|e| SyncError::Decode(e.to_string()))? {
            Some(record) => records.push(record),
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        debug!(skipped, "Skipped non-object feed entries");
    }

    Ok(records)
}
