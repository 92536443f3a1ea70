//! Directory harvesting: collect outbound company URLs from a listing page.
//!
//! The listing is first requested through a cookie-keeping session that
//! waits out challenge interstitials. Outbound anchors are collected; when
//! that yields little, the raw page source is scanned for embedded URLs, and
//! as a last resort a plain request (with retry/backoff) is tried.

mod challenge;
mod links;
mod url_list;

use std::time::Duration;

use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, UPGRADE_INSECURE_REQUESTS};
use tracing::{debug, info, instrument, warn};
use url::Url;

use outreach_shared::{HarvestConfig, OutreachError, Result};

pub use challenge::{ChallengeOptions, ChallengeOutcome, is_challenge_page, wait_for_challenge};
pub use links::{DomainFilter, UrlSet, anchor_urls, clean_url, count_anchors, scan_source_urls};
pub use url_list::{read_url_list, write_url_list};

/// Browser User-Agent sent to the directory.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: usize = 5;

/// Timeout for a single directory request.
const REQUEST_TIMEOUT_SECS: u64 = 15;

/// Statuses worth retrying on the plain fallback request.
const RETRY_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

// ---------------------------------------------------------------------------
// HarvestResult
// ---------------------------------------------------------------------------

/// Outcome of a harvest run.
#[derive(Debug, Clone, Default)]
pub struct HarvestResult {
    /// Harvested company URLs, deduplicated, in discovery order.
    pub urls: Vec<String>,
    /// Whether the session got past any challenge page.
    pub challenge_cleared: bool,
    /// URLs contributed by anchors on the session page.
    pub from_anchors: usize,
    /// URLs contributed by scanning the raw page source.
    pub from_source: usize,
    /// URLs contributed by the plain fallback request.
    pub from_fallback: usize,
}

impl HarvestResult {
    /// Short label naming the methods that produced URLs.
    pub fn method(&self) -> String {
        let mut parts = Vec::new();
        if self.from_anchors > 0 {
            parts.push("anchors");
        }
        if self.from_source > 0 {
            parts.push("page-source");
        }
        if self.from_fallback > 0 {
            parts.push("fallback");
        }
        if parts.is_empty() {
            "none".to_string()
        } else {
            parts.join("+")
        }
    }
}

// ---------------------------------------------------------------------------
// Retry policy
// ---------------------------------------------------------------------------

/// Exponential backoff for transient HTTP failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub retries: u32,
    /// Delay before the first retry; doubled for each later one.
    pub backoff: Duration,
}

impl RetryPolicy {
    fn delay_for(&self, retry: u32) -> Duration {
        self.backoff.saturating_mul(2u32.saturating_pow(retry))
    }
}

impl From<&HarvestConfig> for RetryPolicy {
    fn from(config: &HarvestConfig) -> Self {
        Self {
            retries: config.retry_attempts,
            backoff: config.retry_backoff,
        }
    }
}

// ---------------------------------------------------------------------------
// Main entry point
// ---------------------------------------------------------------------------

/// Harvest outbound company URLs from the configured directory page.
///
/// Never fails because the site refused to cooperate: a directory that
/// stays behind its challenge yields an empty result. Errors are reserved
/// for a bad directory URL or an unusable HTTP client.
#[instrument(skip_all, fields(url = %config.directory_url))]
pub async fn harvest(config: &HarvestConfig) -> Result<HarvestResult> {
    let directory = Url::parse(&config.directory_url).map_err(|e| {
        OutreachError::validation(format!(
            "invalid directory URL '{}': {e}",
            config.directory_url
        ))
    })?;
    let host = directory.host_str().ok_or_else(|| {
        OutreachError::validation(format!("directory URL has no host: {directory}"))
    })?;

    let filter = DomainFilter::new(host, &config.skip_domains);
    let mut found = UrlSet::new(config.max_urls);
    let mut result = HarvestResult::default();

    // --- Session attempt ---
    let session = build_client(true)?;
    match wait_for_challenge(&session, &directory, &ChallengeOptions::from(config)).await {
        ChallengeOutcome::Loaded { url, body } => {
            result.challenge_cleared = true;

            result.from_anchors = add_all(&mut found, anchor_urls(&body, &url, &filter));
            info!(count = result.from_anchors, "collected outbound links");

            if found.len() < config.source_scan_threshold {
                info!("few links found, scanning page source");
                let source_filter = filter.with_extra(&config.extra_source_skip_domains);
                result.from_source = add_all(&mut found, scan_source_urls(&body, &source_filter));
                info!(count = result.from_source, "collected URLs from page source");
            }
        }
        ChallengeOutcome::TimedOut => {
            warn!("could not get past the directory's challenge page");
        }
    }

    // --- Plain request fallback ---
    if found.len() < config.fallback_threshold {
        info!(found = found.len(), "trying plain request fallback");
        let client = build_client(false)?;
        match fetch_with_retry(&client, &directory, &RetryPolicy::from(config)).await {
            Ok((url, body)) if !body.to_lowercase().contains("cloudflare") => {
                result.from_fallback = add_all(&mut found, anchor_urls(&body, &url, &filter));
                info!(count = result.from_fallback, "fallback request succeeded");
            }
            Ok(_) => warn!("fallback request was also served a challenge page"),
            Err(e) => warn!(error = %e, "fallback request failed"),
        }
    }

    result.urls = found.into_vec();
    info!(
        total = result.urls.len(),
        method = %result.method(),
        "harvest completed"
    );
    Ok(result)
}

/// Insert `urls` into `set`, returning how many were new.
fn add_all(set: &mut UrlSet, urls: Vec<String>) -> usize {
    let mut added = 0;
    for url in urls {
        if set.is_full() {
            break;
        }
        if set.insert(url.clone()) {
            added += 1;
            debug!(n = set.len(), %url, "found URL");
        }
    }
    added
}

// ---------------------------------------------------------------------------
// HTTP helpers
// ---------------------------------------------------------------------------

/// Build a directory client with browser-like headers.
/// `session` keeps cookies between requests so a cleared challenge sticks.
fn build_client(session: bool) -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
    headers.insert(UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));

    Client::builder()
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .cookie_store(session)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .map_err(|e| OutreachError::Network(format!("failed to build HTTP client: {e}")))
}

/// GET `url`, retrying transient failures with exponential backoff.
/// Returns the final URL and body of the first successful response.
pub async fn fetch_with_retry(
    client: &Client,
    url: &Url,
    policy: &RetryPolicy,
) -> Result<(Url, String)> {
    let mut attempt = 0;
    loop {
        let outcome = match client.get(url.as_str()).send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    let final_url = response.url().clone();
                    let body = response.text().await.map_err(|e| {
                        OutreachError::Network(format!("{url}: body read failed: {e}"))
                    })?;
                    return Ok((final_url, body));
                }
                let retryable = RETRY_STATUSES.contains(&status.as_u16());
                (retryable, format!("{url}: HTTP {status}"))
            }
            Err(e) => (true, format!("{url}: {e}")),
        };

        let (retryable, message) = outcome;
        if !retryable || attempt >= policy.retries {
            return Err(OutreachError::Network(message));
        }

        let delay = policy.delay_for(attempt);
        debug!(attempt = attempt + 1, delay_ms = delay.as_millis(), error = %message, "retrying");
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
