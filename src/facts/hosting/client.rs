//! GitHub API client
//!
//! Minimal GitHub REST client for repository metadata, the latest release and the latest commit.

use super::models::{Commit, Release, Repository};
use crate::Result;
use crate::facts::RepoName;
use crate::facts::http::{self, Reply, USER_AGENT};
use crate::facts::retry::{AttemptError, BackoffPolicy, Clock, RateLimitInfo, RateLimitPolicy, pause, retry_transient};
use core::time::Duration;
use ohno::app_err;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use url::Url;

const LOG_TARGET: &str = "   hosting";

/// Public GitHub API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.github.com";

/// Construction options for [`Client`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Bearer token. Unauthenticated requests get a much smaller quota.
    pub token: Option<String>,
    pub base_url: String,
    pub timeout: Duration,
    /// Total attempts per request when the transport fails.
    pub max_retries: u32,
    pub backoff_base: f64,
    /// Longest single wait for a rate-limit reset.
    pub max_rate_limit_wait: Duration,
    /// Consecutive rate-limit waits allowed per request; unlimited when `None`.
    pub max_rate_limit_waits: Option<u32>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            token: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(20),
            max_retries: 3,
            backoff_base: 1.5,
            max_rate_limit_wait: Duration::from_secs(3600),
            max_rate_limit_waits: None,
        }
    }
}

/// GitHub API client
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: Url,
    backoff: BackoffPolicy,
    rate_limit: RateLimitPolicy,
    clock: Arc<dyn Clock>,
    cancel: Option<CancellationToken>,
}

impl Client {
    pub fn new(options: &ClientOptions, clock: Arc<dyn Clock>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        let _ = headers.insert("x-github-api-version", HeaderValue::from_static("2022-11-28"));

        if let Some(token) = options.token.as_deref().filter(|t| !t.is_empty()) {
            let mut auth_val = HeaderValue::from_str(&format!("Bearer {token}"))?;
            auth_val.set_sensitive(true);
            let _ = headers.insert(AUTHORIZATION, auth_val);
        }

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(options.timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: http::parse_base_url(&options.base_url)?,
            backoff: BackoffPolicy::new(options.max_retries, options.backoff_base),
            rate_limit: RateLimitPolicy::new(options.max_rate_limit_wait, options.max_rate_limit_waits),
            clock,
            cancel: None,
        })
    }

    /// Abort rate-limit waits once `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Repository metadata, or `None` if the repository does not exist.
    pub async fn get_repository(&self, repo: &RepoName) -> Result<Option<Repository>> {
        self.get_json(&["repos", repo.owner(), repo.repo()], &[]).await
    }

    /// The latest published release, or `None` if the repository has no releases.
    pub async fn get_latest_release(&self, repo: &RepoName) -> Result<Option<Release>> {
        self.get_json(&["repos", repo.owner(), repo.repo(), "releases", "latest"], &[]).await
    }

    /// Timestamp of the most recent commit, optionally on `branch`.
    ///
    /// Returns the author date when present, else the committer date, else `None`.
    pub async fn get_latest_commit_timestamp(&self, repo: &RepoName, branch: Option<&str>) -> Result<Option<String>> {
        let mut query = vec![("per_page", "1")];
        if let Some(branch) = branch.filter(|b| !b.is_empty()) {
            query.push(("sha", branch));
        }

        let commits: Option<Vec<Commit>> = self.get_json(&["repos", repo.owner(), repo.repo(), "commits"], &query).await?;

        Ok(commits
            .as_deref()
            .and_then(<[Commit]>::first)
            .and_then(Commit::timestamp)
            .map(str::to_string))
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<Option<T>> {
        let url = http::endpoint(&self.base_url, segments, query)?;
        let what = format!("fetching {url}");

        let reply = retry_transient(&self.backoff, self.clock.as_ref(), &what, || self.attempt(&url)).await?;
        if matches!(reply, Reply::NotFound) {
            log::debug!(target: LOG_TARGET, "{url} not found");
        }

        reply.decode(&url)
    }

    /// Issue one attempt, waiting out exhausted rate limits without ending the attempt.
    async fn attempt(&self, url: &Url) -> Result<Reply, AttemptError> {
        let mut waits = 0;

        loop {
            let response = self.http.get(url.clone()).send().await?;
            let rate_limit = extract_rate_limit_from_headers(response.headers());
            let status = response.status();

            if let Some(info) = rate_limit {
                log::trace!(target: LOG_TARGET, "{url}: {status}, {} requests remaining", info.remaining);

                if is_rate_limited(status, &info) {
                    if !self.rate_limit.allows_wait(waits) {
                        return Err(AttemptError::Permanent(app_err!(
                            "GitHub rate limit still exhausted after {waits} wait(s)"
                        )));
                    }

                    let wait = self.rate_limit.wait_for(&info, self.clock.now());
                    log::warn!(target: LOG_TARGET, "GitHub rate limit exhausted, waiting {}s before retrying {url}", wait.as_secs());

                    pause(self.clock.as_ref(), wait, self.cancel.as_ref()).await?;
                    waits += 1;
                    continue;
                }
            }

            if status == StatusCode::NOT_FOUND {
                return Ok(Reply::NotFound);
            }

            let response = response.error_for_status()?;
            return Ok(Reply::Body(response.bytes().await?));
        }
    }
}

/// A forbidden or too-many-requests response with no requests remaining.
fn is_rate_limited(status: StatusCode, info: &RateLimitInfo) -> bool {
    matches!(status, StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS) && info.remaining == 0
}

/// Extract rate limit information from API response headers
fn extract_rate_limit_from_headers(headers: &HeaderMap) -> Option<RateLimitInfo> {
    let remaining = headers.get("x-ratelimit-remaining")?.to_str().ok()?.trim().parse::<u64>().ok()?;

    let reset_epoch = headers
        .get("x-ratelimit-reset")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.trim().parse::<i64>().ok());

    Some(RateLimitInfo { remaining, reset_epoch })
}
