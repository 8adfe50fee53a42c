use crate::Result;
use crate::facts::http::{self, Reply, USER_AGENT};
use crate::facts::retry::{AttemptError, BackoffPolicy, Clock, retry_transient};
use core::time::Duration;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde::Deserialize;
use std::sync::Arc;
use url::Url;

const LOG_TARGET: &str = " downloads";

/// Public pypistats API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://pypistats.org/api";

/// Construction options for [`Client`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub base_url: String,
    pub timeout: Duration,
    /// Additional attempts after a transport failure. Zero means a single attempt.
    pub max_retries: u32,
    pub backoff_base: f64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(20),
            max_retries: 0,
            backoff_base: 1.5,
        }
    }
}

/// Download counts over the trailing day, week and month.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct RecentDownloads {
    pub last_day: Option<i64>,
    pub last_week: Option<i64>,
    pub last_month: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RecentResponse {
    data: Option<RecentDownloads>,
}

/// Unauthenticated pypistats client
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: Url,
    backoff: BackoffPolicy,
    clock: Arc<dyn Clock>,
}

impl Client {
    pub fn new(options: &ClientOptions, clock: Arc<dyn Clock>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(options.timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: http::parse_base_url(&options.base_url)?,
            backoff: BackoffPolicy::new(options.max_retries.saturating_add(1), options.backoff_base),
            clock,
        })
    }

    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Recent download counts for `package`, or `None` if the package is unknown.
    pub async fn get_recent(&self, package: &str) -> Result<Option<RecentDownloads>> {
        let url = http::endpoint(&self.base_url, &["packages", package, "recent"], &[])?;
        let what = format!("fetching {url}");

        let reply = retry_transient(&self.backoff, self.clock.as_ref(), &what, || self.attempt(&url)).await?;
        if matches!(reply, Reply::NotFound) {
            log::debug!(target: LOG_TARGET, "package '{package}' not found");
        }

        let response: Option<RecentResponse> = reply.decode(&url)?;
        Ok(response.and_then(|r| r.data))
    }

    async fn attempt(&self, url: &Url) -> Result<Reply, AttemptError> {
        let response = self.http.get(url.clone()).send().await?;
        log::trace!(target: LOG_TARGET, "{url}: {}", response.status());

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Reply::NotFound);
        }

        let response = response.error_for_status()?;
        Ok(Reply::Body(response.bytes().await?))
    }
}
