//! Waiting out interstitial anti-bot challenge pages.
//!
//! Some directories sit behind a challenge page ("checking your browser")
//! that clears after a short delay for a session that keeps its cookies.
//! The wait is a plain poll: re-request, inspect, sleep.

use std::time::{Duration, Instant};

use reqwest::Client;
use tracing::{debug, info, warn};
use url::Url;

use outreach_shared::HarvestConfig;

use crate::links::count_anchors;

/// Poll settings for [`wait_for_challenge`].
#[derive(Debug, Clone)]
pub struct ChallengeOptions {
    /// Give up after this long.
    pub timeout: Duration,
    /// Sleep while a challenge page is showing.
    pub challenge_poll: Duration,
    /// Sleep while the page is up but has too few links.
    pub retry_poll: Duration,
    /// The page counts as loaded once it has more anchors than this.
    pub min_links: usize,
}

impl From<&HarvestConfig> for ChallengeOptions {
    fn from(config: &HarvestConfig) -> Self {
        Self {
            timeout: config.challenge_timeout,
            challenge_poll: config.challenge_poll,
            retry_poll: config.retry_poll,
            min_links: config.min_links,
        }
    }
}

/// Result of waiting on a page.
#[derive(Debug, Clone)]
pub enum ChallengeOutcome {
    /// Real content arrived.
    Loaded {
        /// Final URL after redirects.
        url: Url,
        body: String,
    },
    /// Still challenged (or still empty) when the timeout expired.
    TimedOut,
}

/// Whether a response looks like a challenge interstitial.
pub fn is_challenge_page(final_url: &Url, body: &str) -> bool {
    final_url.as_str().to_lowercase().contains("challenge")
        || body.to_lowercase().contains("cloudflare")
}

/// Re-request `url` until it serves real content or `opts.timeout` expires.
pub async fn wait_for_challenge(
    client: &Client,
    url: &Url,
    opts: &ChallengeOptions,
) -> ChallengeOutcome {
    info!(%url, "waiting for challenge page to clear");
    let start = Instant::now();

    while start.elapsed() < opts.timeout {
        match fetch_once(client, url).await {
            Ok((final_url, body)) => {
                if is_challenge_page(&final_url, &body) {
                    info!("still on challenge page, waiting");
                    tokio::time::sleep(opts.challenge_poll).await;
                    continue;
                }

                let anchors = count_anchors(&body);
                if anchors > opts.min_links {
                    info!(anchors, elapsed_ms = start.elapsed().as_millis(), "page loaded");
                    return ChallengeOutcome::Loaded {
                        url: final_url,
                        body,
                    };
                }
                debug!(anchors, "page has too few links, retrying");
            }
            Err(e) => debug!(error = %e, "request failed while waiting"),
        }

        tokio::time::sleep(opts.retry_poll).await;
    }

    warn!(timeout_secs = opts.timeout.as_secs(), "timed out waiting for challenge page");
    ChallengeOutcome::TimedOut
}

async fn fetch_once(client: &Client, url: &Url) -> reqwest::Result<(Url, String)> {
    let response = client.get(url.as_str()).send().await?;
    let final_url = response.url().clone();
    let body = response.text().await?;
    Ok((final_url, body))
}
