//! Core domain types for the outreach ledger.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::OutreachError;

/// Ledger column headers, in file order.
pub const LEDGER_HEADERS: [&str; 5] = ["Company", "Website", "Title", "Emails", "status"];

/// Value written to the `Emails` column when no address was found.
pub const NO_EMAIL_PLACEHOLDER: &str = "N/A";

/// Title recorded for a company whose page could not be fetched.
pub const SCRAPING_ERROR_TITLE: &str = "Scraping Error";

// ---------------------------------------------------------------------------
// RecordStatus
// ---------------------------------------------------------------------------

/// Lifecycle status of a ledger row.
///
/// `Unsent` is the only non-terminal state; every transition moves a row
/// from `Unsent` into one of the terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Unsent,
    NoEmailFound,
    Sent,
    Failed,
    ScrapingFailed,
}

impl RecordStatus {
    /// All statuses, in display order.
    pub const ALL: [RecordStatus; 5] = [
        Self::Unsent,
        Self::NoEmailFound,
        Self::Sent,
        Self::Failed,
        Self::ScrapingFailed,
    ];

    /// On-disk representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unsent => "unsent",
            Self::NoEmailFound => "no_email_found",
            Self::Sent => "sent",
            Self::Failed => "failed",
            Self::ScrapingFailed => "scraping_failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Unsent)
    }

    /// Whether a row in this state may move to `next`.
    pub fn can_transition_to(&self, next: RecordStatus) -> bool {
        !self.is_terminal() && next.is_terminal()
    }
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RecordStatus {
    type Err = OutreachError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s.trim())
            .ok_or_else(|| OutreachError::validation(format!("unknown status '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// CompanyRecord
// ---------------------------------------------------------------------------

/// One company in the outreach ledger, keyed by `website`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyRecord {
    /// Display name derived from the website hostname.
    pub company: String,
    /// The company URL as listed by the harvest stage.
    pub website: String,
    /// Page title (or the company name when the page had none).
    pub title: String,
    /// Discovered contact addresses, lower-cased and sorted.
    pub emails: Vec<String>,
    pub status: RecordStatus,
}

impl CompanyRecord {
    /// Build a record for a successfully fetched page.
    /// Rows with at least one address start `unsent`; the rest are parked
    /// as `no_email_found`.
    pub fn scraped(
        company: impl Into<String>,
        website: impl Into<String>,
        title: impl Into<String>,
        emails: Vec<String>,
    ) -> Self {
        let status = if emails.is_empty() {
            RecordStatus::NoEmailFound
        } else {
            RecordStatus::Unsent
        };
        Self {
            company: company.into(),
            website: website.into(),
            title: title.into(),
            emails,
            status,
        }
    }

    /// Build a record for a page that could not be fetched.
    pub fn scraping_failed(company: impl Into<String>, website: impl Into<String>) -> Self {
        Self {
            company: company.into(),
            website: website.into(),
            title: SCRAPING_ERROR_TITLE.to_string(),
            emails: Vec::new(),
            status: RecordStatus::ScrapingFailed,
        }
    }

    /// The `Emails` column value.
    pub fn emails_field(&self) -> String {
        if self.emails.is_empty() {
            NO_EMAIL_PLACEHOLDER.to_string()
        } else {
            self.emails.join(", ")
        }
    }

    /// Parse an `Emails` column value back into a list.
    pub fn parse_emails(field: &str) -> Vec<String> {
        let field = field.trim();
        if field.is_empty() || field.eq_ignore_ascii_case(NO_EMAIL_PLACEHOLDER) {
            return Vec::new();
        }
        field
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    }

    /// The address outreach goes to: the first listed one, if it looks usable.
    pub fn primary_email(&self) -> Option<&str> {
        let first = self.emails.first()?.trim();
        if first.eq_ignore_ascii_case(NO_EMAIL_PLACEHOLDER) || !first.contains('@') {
            return None;
        }
        Some(first)
    }
}

/// Derive a display company name from a URL's hostname.
///
/// `https://www.acme.io/pricing` becomes `Acme`. Anything without a usable
/// host yields `Unknown`.
pub fn company_name_from_url(url: &str) -> String {
    let host = match Url::parse(url.trim()) {
        Ok(parsed) => parsed.host_str().unwrap_or_default().to_lowercase(),
        Err(_) => return "Unknown".to_string(),
    };

    let label = host.replace("www.", "");
    let label = label.split('.').next().unwrap_or_default();

    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => "Unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_roundtrips_through_strings() {
        for status in RecordStatus::ALL {
            let parsed: RecordStatus = status.as_str().parse().expect("parse status");
            assert_eq!(parsed, status);
        }
        assert!("pending".parse::<RecordStatus>().is_err());
    }

    #[test]
    fn only_unsent_can_transition() {
        assert!(RecordStatus::Unsent.can_transition_to(RecordStatus::Sent));
        assert!(RecordStatus::Unsent.can_transition_to(RecordStatus::Failed));
        assert!(RecordStatus::Unsent.can_transition_to(RecordStatus::NoEmailFound));
        assert!(!RecordStatus::Unsent.can_transition_to(RecordStatus::Unsent));
        assert!(!RecordStatus::Sent.can_transition_to(RecordStatus::Failed));
        assert!(!RecordStatus::Failed.can_transition_to(RecordStatus::Unsent));
    }

    #[test]
    fn scraped_record_status_follows_emails() {
        let with = CompanyRecord::scraped(
            "Acme",
            "https://acme.io",
            "Acme",
            vec!["hi@acme.io".into()],
        );
        assert_eq!(with.status, RecordStatus::Unsent);

        let without = CompanyRecord::scraped("Acme", "https://acme.io", "Acme", vec![]);
        assert_eq!(without.status, RecordStatus::NoEmailFound);
        assert_eq!(without.emails_field(), "N/A");
    }

    #[test]
    fn emails_field_parses_back() {
        let record = CompanyRecord::scraped(
            "Acme",
            "https://acme.io",
            "Acme",
            vec!["a@acme.io".into(), "b@acme.io".into()],
        );
        assert_eq!(record.emails_field(), "a@acme.io, b@acme.io");
        assert_eq!(
            CompanyRecord::parse_emails(&record.emails_field()),
            record.emails
        );
        assert!(CompanyRecord::parse_emails("N/A").is_empty());
        assert!(CompanyRecord::parse_emails("  ").is_empty());
    }

    #[test]
    fn primary_email_requires_at_sign() {
        let mut record = CompanyRecord::scraped(
            "Acme",
            "https://acme.io",
            "Acme",
            vec![" sales@acme.io ".into(), "b@acme.io".into()],
        );
        assert_eq!(record.primary_email(), Some("sales@acme.io"));

        record.emails = vec!["not-an-address".into()];
        assert_eq!(record.primary_email(), None);

        record.emails.clear();
        assert_eq!(record.primary_email(), None);
    }

    #[test]
    fn company_names_from_urls() {
        assert_eq!(company_name_from_url("https://www.acme.io/pricing"), "Acme");
        assert_eq!(company_name_from_url("https://app.Foo-Bar.com"), "App");
        assert_eq!(company_name_from_url("http://localhost:8080/"), "Localhost");
        assert_eq!(company_name_from_url("not a url"), "Unknown");
    }

    #[test]
    fn scraping_failure_record() {
        let record = CompanyRecord::scraping_failed("Acme", "https://acme.io");
        assert_eq!(record.title, SCRAPING_ERROR_TITLE);
        assert_eq!(record.status, RecordStatus::ScrapingFailed);
        assert_eq!(record.emails_field(), NO_EMAIL_PLACEHOLDER);
    }
}
