//! Prepare stage: URL list → scraped rows appended to the ledger.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::{info, instrument};

use outreach_crawler::ContactScraper;
use outreach_discovery::read_url_list;
use outreach_ledger::Ledger;
use outreach_shared::{PrepareConfig, RecordStatus, Result};

use crate::progress::ProgressReporter;

/// Result of [`run_prepare`].
#[derive(Debug, Default)]
pub struct PrepareReport {
    /// Lines in the URL list.
    pub listed: usize,
    /// URLs not yet in the ledger.
    pub new_urls: usize,
    /// Rows appended with at least one address.
    pub with_email: usize,
    /// Rows appended without any address.
    pub no_email: usize,
    /// Rows appended for pages that could not be fetched.
    pub failed: usize,
    pub ledger_path: PathBuf,
    pub elapsed: Duration,
}

impl PrepareReport {
    /// Rows appended in this run.
    pub fn added(&self) -> usize {
        self.with_email + self.no_email + self.failed
    }

    pub fn is_up_to_date(&self) -> bool {
        self.new_urls == 0
    }
}

/// Scrape every URL in the list that the ledger does not know yet.
pub async fn run_prepare(
    config: &PrepareConfig,
    progress: &dyn ProgressReporter,
) -> Result<PrepareReport> {
    let scraper = ContactScraper::new(config)?;
    prepare_with(&scraper, config, progress).await
}

/// [`run_prepare`] with a caller-supplied scraper.
#[instrument(skip_all, fields(ledger = %config.ledger_path.display()))]
pub async fn prepare_with(
    scraper: &ContactScraper,
    config: &PrepareConfig,
    progress: &dyn ProgressReporter,
) -> Result<PrepareReport> {
    let start = Instant::now();

    progress.phase("Loading ledger");
    let mut ledger = Ledger::open_or_create(&config.ledger_path)?;
    let listed = read_url_list(&config.urls_path)?;

    let mut seen = HashSet::new();
    let pending: Vec<String> = listed
        .iter()
        .filter(|url| !ledger.contains(url) && seen.insert(url.as_str()))
        .cloned()
        .collect();

    let mut report = PrepareReport {
        listed: listed.len(),
        new_urls: pending.len(),
        ledger_path: config.ledger_path.clone(),
        ..PrepareReport::default()
    };

    info!(
        listed = report.listed,
        known = ledger.len(),
        new = report.new_urls,
        "loaded URL list"
    );

    if pending.is_empty() {
        info!("ledger is up to date");
        report.elapsed = start.elapsed();
        progress.finish("Ledger is up to date");
        return Ok(report);
    }

    progress.phase("Scraping company pages");
    let total = pending.len();
    for (i, url) in pending.iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(pause(config.rate_limit, config.rate_jitter)).await;
        }
        progress.item(url, i + 1, total);

        let record = scraper.scrape(url).await;
        match record.status {
            RecordStatus::Unsent => report.with_email += 1,
            RecordStatus::ScrapingFailed => report.failed += 1,
            _ => report.no_email += 1,
        }
        ledger.append(record)?;
    }

    report.elapsed = start.elapsed();
    info!(
        added = report.added(),
        with_email = report.with_email,
        no_email = report.no_email,
        failed = report.failed,
        elapsed_ms = report.elapsed.as_millis(),
        "prepare stage complete"
    );
    progress.finish(&format!("Added {} companies", report.added()));

    Ok(report)
}

/// Delay between page requests: the base rate limit plus random jitter.
fn pause(base: Duration, jitter: Duration) -> Duration {
    let jitter_ms = jitter.as_millis() as u64;
    if jitter_ms == 0 {
        return base;
    }
    base + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
}
