//! Page fetching over HTTP with bounded retry.
//!
//! All network failure modes (transport errors, timeouts, non-success
//! status codes) are treated the same way: retried under the shared
//! [`RetryPolicy`], then surfaced as a [`BinderError::Fetch`].

use std::time::Duration;

use chrono::Utc;
use reqwest::Client;
use tracing::{debug, warn};
use url::Url;

use docbinder_shared::{BinderError, RawPage, Result, RetryPolicy, normalize_url};

/// User-Agent string for all requests.
pub const USER_AGENT: &str = concat!("docbinder/", env!("CARGO_PKG_VERSION"));

/// HTTP page fetcher with retry/backoff.
#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: Client,
    retry: RetryPolicy,
}

impl PageFetcher {
    /// Build a fetcher with a per-request timeout and retry policy.
    pub fn new(timeout: Duration, retry: RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(timeout)
            .build()
            .map_err(|e| BinderError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, retry })
    }

    /// Fetch a page, retrying with backoff until the policy is exhausted.
    pub async fn fetch(&self, url: &Url) -> Result<RawPage> {
        let mut failures = 0u32;
        loop {
            match self.try_fetch(url).await {
                Ok(page) => return Ok(page),
                Err(e) => {
                    failures += 1;
                    if !self.retry.should_retry(failures) {
                        warn!(%url, attempts = failures, error = %e, "fetch failed, giving up");
                        return Err(e);
                    }
                    let delay = self.retry.backoff(failures - 1);
                    debug!(%url, attempt = failures, ?delay, error = %e, "fetch failed, retrying");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn try_fetch(&self, url: &Url) -> Result<RawPage> {
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| BinderError::fetch(url.as_str(), e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BinderError::fetch(url.as_str(), format!("HTTP {status}")));
        }

        let final_url = normalize_url(response.url());
        let requested = normalize_url(url);
        let final_url = (final_url != requested).then_some(final_url);

        let body = response
            .text()
            .await
            .map_err(|e| BinderError::fetch(url.as_str(), format!("body read failed: {e}")))?;

        Ok(RawPage {
            url: requested,
            final_url,
            raw_markup: body,
            http_status: status.as_u16(),
            fetched_at: Utc::now(),
        })
    }
}
