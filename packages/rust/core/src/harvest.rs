//! Harvest stage: directory page → URL list file.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};

use outreach_discovery::write_url_list;
use outreach_shared::{HarvestConfig, Result};

use crate::progress::ProgressReporter;

/// Result of [`run_harvest`].
#[derive(Debug)]
pub struct HarvestReport {
    /// URLs collected from the directory.
    pub found: usize,
    /// URLs written after cleaning and deduplication.
    pub saved: usize,
    /// Which methods produced URLs.
    pub method: String,
    /// Whether the session got past the challenge page.
    pub challenge_cleared: bool,
    /// Where the list was written; `None` when nothing was found.
    pub path: Option<PathBuf>,
    pub elapsed: Duration,
}

/// Harvest company URLs and write the cleaned list.
///
/// Finding nothing is not an error; the existing list file is left alone.
#[instrument(skip_all, fields(url = %config.directory_url))]
pub async fn run_harvest(
    config: &HarvestConfig,
    progress: &dyn ProgressReporter,
) -> Result<HarvestReport> {
    let start = Instant::now();

    progress.phase("Loading directory page");
    let result = outreach_discovery::harvest(config).await?;
    let method = result.method();

    let (saved, path) = if result.urls.is_empty() {
        warn!("no company URLs were found");
        (0, None)
    } else {
        progress.phase("Saving URL list");
        let saved = write_url_list(&config.output_path, &result.urls)?;
        (saved, Some(config.output_path.clone()))
    };

    let report = HarvestReport {
        found: result.urls.len(),
        saved,
        method,
        challenge_cleared: result.challenge_cleared,
        path,
        elapsed: start.elapsed(),
    };

    info!(
        found = report.found,
        saved = report.saved,
        method = %report.method,
        elapsed_ms = report.elapsed.as_millis(),
        "harvest stage complete"
    );
    progress.finish(&format!("Harvested {} URLs", report.saved));

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::SilentProgress;

    fn config(server: &wiremock::MockServer, out: PathBuf) -> HarvestConfig {
        let mut config = HarvestConfig::from(&outreach_shared::AppConfig::default());
        config.directory_url = format!("{}/s/automation/", server.uri());
        config.output_path = out;
        config.challenge_timeout = Duration::from_millis(300);
        config.challenge_poll = Duration::from_millis(20);
        config.retry_poll = Duration::from_millis(20);
        config.retry_backoff = Duration::from_millis(5);
        config.retry_attempts = 1;
        config
    }

    #[tokio::test]
    async fn writes_cleaned_list() {
        let server = wiremock::MockServer::start().await;
        let anchors: String = [
            "https://zeta.ai/?ref=dir",
            "https://alpha.io/",
            "https://alpha.io/#top",
            "https://beta.dev/tools",
            "https://gamma.app/",
            "https://delta.so/",
            "https://epsilon.co/",
        ]
        .iter()
        .map(|u| format!("<a href=\"{u}\">x</a>"))
        .collect();
        wiremock::Mock::given(wiremock::matchers::path("/s/automation/"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(anchors))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("urls.txt");
        let report = run_harvest(&config(&server, out.clone()), &SilentProgress)
            .await
            .unwrap();

        assert!(report.challenge_cleared);
        assert_eq!(report.found, 7);
        assert_eq!(report.saved, 6);
        assert_eq!(report.path.as_deref(), Some(out.as_path()));

        let written = std::fs::read_to_string(&out).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines.first(), Some(&"https://alpha.io/"));
        assert_eq!(lines.last(), Some(&"https://zeta.ai/"));
    }

    #[tokio::test]
    async fn empty_harvest_leaves_existing_list_untouched() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::any())
            .respond_with(wiremock::ResponseTemplate::new(403).set_body_string("cloudflare"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("urls.txt");
        std::fs::write(&out, "https://kept.io/\n").unwrap();

        let report = run_harvest(&config(&server, out.clone()), &SilentProgress)
            .await
            .unwrap();

        assert_eq!(report.saved, 0);
        assert!(report.path.is_none());
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "https://kept.io/\n");
    }
}
