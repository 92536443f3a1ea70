//! Company page scraper.
//!
//! Fetches a single company URL, pulls the page title and every contact
//! address out of it, and turns the outcome into a ledger record. Failures
//! never escape: they become `scraping_failed` rows.

use std::net::IpAddr;
use std::time::Duration;

use reqwest::Client;
use scraper::Html;
use tracing::{debug, info, instrument, warn};
use url::Url;

use outreach_shared::{CompanyRecord, OutreachError, PrepareConfig, Result, company_name_from_url};

use crate::extract::{extract_emails, extract_title};

/// User-Agent string for company page requests.
const USER_AGENT: &str = concat!(
    "Mozilla/5.0 (compatible; outreach/",
    env!("CARGO_PKG_VERSION"),
    ")"
);

/// Maximum number of redirects to follow per page.
const MAX_REDIRECTS: usize = 5;

// ---------------------------------------------------------------------------
// PageContacts
// ---------------------------------------------------------------------------

/// What a single company page yielded.
#[derive(Debug, Clone)]
pub struct PageContacts {
    /// `<title>` text, if the page had a non-empty one.
    pub title: Option<String>,
    /// Addresses found anywhere in the page source.
    pub emails: Vec<String>,
    pub status_code: u16,
}

// ---------------------------------------------------------------------------
// ContactScraper
// ---------------------------------------------------------------------------

/// Sequential company page scraper.
pub struct ContactScraper {
    client: Client,
    /// Allow localhost/private IPs (for integration tests with mock servers).
    allow_localhost: bool,
}

impl ContactScraper {
    /// Create a scraper using the prepare stage's timeout.
    pub fn new(config: &PrepareConfig) -> Result<Self> {
        Self::with_timeout(config.timeout)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(timeout)
            .build()
            .map_err(|e| OutreachError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            allow_localhost: false,
        })
    }

    /// Allow scraping localhost/private IPs (for integration tests).
    pub fn allow_localhost(mut self) -> Self {
        self.allow_localhost = true;
        self
    }

    /// Scrape `url` into a ledger record.
    ///
    /// The company name comes from the hostname; the title falls back to the
    /// company name when the page has none.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn scrape(&self, url: &str) -> CompanyRecord {
        let company = company_name_from_url(url);

        match self.fetch_contacts(url).await {
            Ok(page) => {
                let title = page.title.unwrap_or_else(|| company.clone());
                info!(
                    company = %company,
                    emails = page.emails.len(),
                    status = page.status_code,
                    "company page scraped"
                );
                CompanyRecord::scraped(company, url, title, page.emails)
            }
            Err(e) => {
                warn!(company = %company, error = %e, "failed to scrape company page");
                CompanyRecord::scraping_failed(company, url)
            }
        }
    }

    /// Fetch `url` and extract its title and addresses.
    pub async fn fetch_contacts(&self, url: &str) -> Result<PageContacts> {
        let parsed = Url::parse(url.trim())
            .map_err(|e| OutreachError::validation(format!("invalid URL '{url}': {e}")))?;

        if !self.allow_localhost && is_ssrf_target(&parsed) {
            warn!(url = %parsed, "URL points at a local or private network address, not fetching");
            return Err(OutreachError::validation(format!(
                "{parsed}: refusing to fetch a local or private network address"
            )));
        }

        debug!(url = %parsed, "fetching company page");

        let response = self
            .client
            .get(parsed.as_str())
            .send()
            .await
            .map_err(|e| OutreachError::Network(format!("{parsed}: {e}")))?;

        // Non-2xx bodies are scanned like any other page.
        let status = response.status();
        if !status.is_success() {
            debug!(url = %parsed, %status, "non-success status, scanning body anyway");
        }

        let body = response
            .text()
            .await
            .map_err(|e| OutreachError::Network(format!("{parsed}: body read failed: {e}")))?;

        let doc = Html::parse_document(&body);

        Ok(PageContacts {
            title: extract_title(&doc),
            emails: extract_emails(&body),
            status_code: status.as_u16(),
        })
    }
}

// ---------------------------------------------------------------------------
// SSRF protection
// ---------------------------------------------------------------------------

/// Check if a URL targets a potentially dangerous resource.
pub(crate) fn is_ssrf_target(url: &Url) -> bool {
    match url.scheme() {
        "http" | "https" => {}
        _ => return true,
    }

    match url.host() {
        Some(url::Host::Ipv4(v4)) => is_private_ip(&IpAddr::V4(v4)),
        Some(url::Host::Ipv6(v6)) => is_private_ip(&IpAddr::V6(v6)),
        Some(url::Host::Domain(host)) => {
            host == "localhost" || host.ends_with(".local") || host.ends_with(".internal")
        }
        None => true,
    }
}

/// Check if an IP is in a private/reserved range.
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                // 100.64.0.0/10 (Carrier-grade NAT)
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64)
        }
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outreach_shared::RecordStatus;

    fn scraper() -> ContactScraper {
        ContactScraper::with_timeout(Duration::from_secs(5))
            .unwrap()
            .allow_localhost()
    }

    #[test]
    fn ssrf_blocks_private_targets() {
        for url in [
            "file:///etc/passwd",
            "http://192.168.1.1/admin",
            "http://10.0.0.1/",
            "http://127.0.0.1:8080/",
            "http://localhost:3000/",
            "http://[::1]/",
        ] {
            assert!(is_ssrf_target(&Url::parse(url).unwrap()), "{url}");
        }
        assert!(!is_ssrf_target(&Url::parse("https://acme.io/contact").unwrap()));
    }

    #[tokio::test]
    async fn local_targets_fail_without_opt_in() {
        let strict = ContactScraper::with_timeout(Duration::from_secs(1)).unwrap();
        let record = strict.scrape("http://127.0.0.1:9/").await;
        assert_eq!(record.status, RecordStatus::ScrapingFailed);

        let err = strict
            .fetch_contacts("http://192.168.1.20/contact")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("private network address"));
    }

    #[tokio::test]
    async fn scrape_page_with_emails() {
        let server = wiremock::MockServer::start().await;
        let page = r#"<html><head><title>Acme | AI Automation</title></head>
            <body>
                <p>Write to <a href="mailto:Hello@Acme.io">Hello@Acme.io</a></p>
                <footer>press@acme.io, hello@acme.io</footer>
            </body></html>"#;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(page))
            .mount(&server)
            .await;

        let record = scraper().scrape(&server.uri()).await;

        assert_eq!(record.company, "127");
        assert_eq!(record.website, server.uri());
        assert_eq!(record.title, "Acme | AI Automation");
        assert_eq!(record.emails, vec!["hello@acme.io", "press@acme.io"]);
        assert_eq!(record.status, RecordStatus::Unsent);
    }

    #[tokio::test]
    async fn page_without_emails_or_title() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::path("/about"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_string("<html><body><p>Nothing here</p></body></html>"),
            )
            .mount(&server)
            .await;

        let url = format!("{}/about", server.uri());
        let record = scraper().scrape(&url).await;

        assert_eq!(record.status, RecordStatus::NoEmailFound);
        assert_eq!(record.title, record.company);
        assert!(record.emails.is_empty());
    }

    #[tokio::test]
    async fn error_pages_are_still_scanned() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::path("/missing"))
            .respond_with(wiremock::ResponseTemplate::new(404).set_body_string(
                "<html><head><title>Acme - Page not found</title></head>\
                 <body>Lost? Write to hello@acme.io</body></html>",
            ))
            .mount(&server)
            .await;
        wiremock::Mock::given(wiremock::matchers::path("/down"))
            .respond_with(wiremock::ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let record = scraper().scrape(&format!("{}/missing", server.uri())).await;
        assert_eq!(record.status, RecordStatus::Unsent);
        assert_eq!(record.title, "Acme - Page not found");
        assert_eq!(record.emails, vec!["hello@acme.io"]);

        let page = scraper()
            .fetch_contacts(&format!("{}/missing", server.uri()))
            .await
            .unwrap();
        assert_eq!(page.status_code, 404);

        let empty = scraper().scrape(&format!("{}/down", server.uri())).await;
        assert_eq!(empty.status, RecordStatus::NoEmailFound);
        assert_eq!(empty.title, empty.company);
    }

    #[tokio::test]
    async fn connection_failure_is_a_scraping_failure() {
        // Nothing listens on the discard port.
        let record = scraper().scrape("http://127.0.0.1:9/").await;
        assert_eq!(record.status, RecordStatus::ScrapingFailed);
        assert_eq!(record.title, outreach_shared::SCRAPING_ERROR_TITLE);
    }

    #[tokio::test]
    async fn invalid_url_is_a_scraping_failure() {
        let record = scraper().scrape("not a url").await;
        assert_eq!(record.company, "Unknown");
        assert_eq!(record.status, RecordStatus::ScrapingFailed);
    }
}
