//! Application configuration for the outreach pipeline.
//!
//! User config lives at `~/.outreach/outreach.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{OutreachError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "outreach.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".outreach";

// ---------------------------------------------------------------------------
// Config structs (matching outreach.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Flat files shared between stages.
    #[serde(default)]
    pub files: FilesConfig,

    /// Directory harvesting.
    #[serde(default)]
    pub harvest: HarvestSection,

    /// Company page scraping.
    #[serde(default)]
    pub prepare: PrepareSection,

    /// Outreach mail.
    #[serde(default)]
    pub mail: MailSection,
}

/// `[files]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesConfig {
    /// Line-delimited URL list written by `harvest`.
    #[serde(default = "default_urls_file")]
    pub urls_file: String,

    /// CSV ledger written by `prepare` and updated by `send`.
    #[serde(default = "default_ledger_file")]
    pub ledger_file: String,

    /// File attached to every outreach email.
    #[serde(default = "default_attachment")]
    pub attachment: String,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            urls_file: default_urls_file(),
            ledger_file: default_ledger_file(),
            attachment: default_attachment(),
        }
    }
}

fn default_urls_file() -> String {
    "ai_company_urls.txt".into()
}
fn default_ledger_file() -> String {
    "companies.csv".into()
}
fn default_attachment() -> String {
    "resume.pdf".into()
}

/// `[harvest]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestSection {
    /// Directory listing page to harvest company links from.
    #[serde(default = "default_directory_url")]
    pub directory_url: String,

    /// Maximum number of company URLs to keep.
    #[serde(default = "default_max_urls")]
    pub max_urls: usize,

    /// Give up waiting for an interstitial challenge after this many seconds.
    #[serde(default = "default_challenge_timeout")]
    pub challenge_timeout_secs: u64,

    /// Wait between polls while a challenge page is showing.
    #[serde(default = "default_challenge_poll")]
    pub challenge_poll_ms: u64,

    /// Wait between polls while the page is up but still thin on links.
    #[serde(default = "default_retry_poll")]
    pub retry_poll_ms: u64,

    /// A page counts as loaded once it carries more anchors than this.
    #[serde(default = "default_min_links")]
    pub min_links: usize,

    /// Scan the raw page source when fewer URLs than this were found.
    #[serde(default = "default_source_scan_threshold")]
    pub source_scan_threshold: usize,

    /// Try a plain one-shot request when fewer URLs than this were found.
    #[serde(default = "default_fallback_threshold")]
    pub fallback_threshold: usize,

    /// Retries for the plain fallback request (429/5xx and transport errors).
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// First retry backoff; doubles on every further attempt.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,

    /// Domains that are never company sites.
    #[serde(default = "default_skip_domains")]
    pub skip_domains: Vec<String>,

    /// Additional domains skipped only when scanning raw page source.
    #[serde(default = "default_extra_source_skip_domains")]
    pub extra_source_skip_domains: Vec<String>,
}

impl Default for HarvestSection {
    fn default() -> Self {
        Self {
            directory_url: default_directory_url(),
            max_urls: default_max_urls(),
            challenge_timeout_secs: default_challenge_timeout(),
            challenge_poll_ms: default_challenge_poll(),
            retry_poll_ms: default_retry_poll(),
            min_links: default_min_links(),
            source_scan_threshold: default_source_scan_threshold(),
            fallback_threshold: default_fallback_threshold(),
            retry_attempts: default_retry_attempts(),
            retry_backoff_ms: default_retry_backoff(),
            skip_domains: default_skip_domains(),
            extra_source_skip_domains: default_extra_source_skip_domains(),
        }
    }
}

fn default_directory_url() -> String {
    "https://theresanaiforthat.com/s/automation/".into()
}
fn default_max_urls() -> usize {
    500
}
fn default_challenge_timeout() -> u64 {
    30
}
fn default_challenge_poll() -> u64 {
    2000
}
fn default_retry_poll() -> u64 {
    1000
}
fn default_min_links() -> usize {
    5
}
fn default_source_scan_threshold() -> usize {
    10
}
fn default_fallback_threshold() -> usize {
    5
}
fn default_retry_attempts() -> u32 {
    3
}
fn default_retry_backoff() -> u64 {
    1000
}
fn default_skip_domains() -> Vec<String> {
    [
        "google.com",
        "facebook.com",
        "twitter.com",
        "linkedin.com",
        "youtube.com",
        "instagram.com",
        "github.com",
        "medium.com",
        "reddit.com",
        "discord.com",
        "telegram.org",
        "apple.com",
        "play.google.com",
        "apps.apple.com",
        "chrome.google.com",
        "producthunt.com",
        "crunchbase.com",
        "techcrunch.com",
        "cloudflare.com",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
fn default_extra_source_skip_domains() -> Vec<String> {
    vec!["w3.org".into(), "mozilla.org".into()]
}

/// `[prepare]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepareSection {
    /// Per-page request timeout.
    #[serde(default = "default_prepare_timeout")]
    pub timeout_secs: u64,

    /// Minimum pause between company page requests.
    #[serde(default = "default_rate_limit")]
    pub rate_limit_ms: u64,

    /// Random extra pause added on top of `rate_limit_ms`.
    #[serde(default)]
    pub rate_jitter_ms: u64,
}

impl Default for PrepareSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_prepare_timeout(),
            rate_limit_ms: default_rate_limit(),
            rate_jitter_ms: 0,
        }
    }
}

fn default_prepare_timeout() -> u64 {
    20
}
fn default_rate_limit() -> u64 {
    500
}

/// `[mail]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailSection {
    /// SMTP relay host (implicit TLS).
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,

    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    /// Name of the env var holding the SMTP user (never store it here).
    #[serde(default = "default_user_env")]
    pub user_env: String,

    /// Name of the env var holding the SMTP password.
    #[serde(default = "default_pass_env")]
    pub pass_env: String,

    /// Maximum emails sent per run.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Pause between consecutive emails.
    #[serde(default = "default_delay_secs")]
    pub delay_secs: u64,

    /// Signature used by the `{sender_name}` placeholder.
    #[serde(default = "default_sender_name")]
    pub sender_name: String,

    #[serde(default = "default_subject_template")]
    pub subject_template: String,

    #[serde(default = "default_body_template")]
    pub body_template: String,
}

impl Default for MailSection {
    fn default() -> Self {
        Self {
            smtp_host: default_smtp_host(),
            smtp_port: default_smtp_port(),
            user_env: default_user_env(),
            pass_env: default_pass_env(),
            batch_size: default_batch_size(),
            delay_secs: default_delay_secs(),
            sender_name: default_sender_name(),
            subject_template: default_subject_template(),
            body_template: default_body_template(),
        }
    }
}

fn default_smtp_host() -> String {
    "smtp.gmail.com".into()
}
fn default_smtp_port() -> u16 {
    465
}
fn default_user_env() -> String {
    "EMAIL_USER".into()
}
fn default_pass_env() -> String {
    "EMAIL_PASS".into()
}
fn default_batch_size() -> usize {
    50
}
fn default_delay_secs() -> u64 {
    10
}
fn default_sender_name() -> String {
    "Your Name".into()
}
fn default_subject_template() -> String {
    "Exploring Career Opportunities with {company}".into()
}
fn default_body_template() -> String {
    "Hello,\n\n\
     My name is {sender_name}. I am very interested in exploring potential career \
     opportunities with {company} and would love the chance to connect and have a brief chat.\n\n\
     My resume is attached for your consideration.\n\n\
     Looking forward to your response.\n\n\
     Best regards,\n\
     {sender_name}\n"
        .into()
}

// ---------------------------------------------------------------------------
// Runtime configs (merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime harvest configuration.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub directory_url: String,
    pub output_path: PathBuf,
    pub max_urls: usize,
    pub challenge_timeout: Duration,
    pub challenge_poll: Duration,
    pub retry_poll: Duration,
    pub min_links: usize,
    pub source_scan_threshold: usize,
    pub fallback_threshold: usize,
    pub retry_attempts: u32,
    pub retry_backoff: Duration,
    pub skip_domains: Vec<String>,
    pub extra_source_skip_domains: Vec<String>,
}

impl From<&AppConfig> for HarvestConfig {
    fn from(config: &AppConfig) -> Self {
        let h = &config.harvest;
        Self {
            directory_url: h.directory_url.clone(),
            output_path: PathBuf::from(&config.files.urls_file),
            max_urls: h.max_urls,
            challenge_timeout: Duration::from_secs(h.challenge_timeout_secs),
            challenge_poll: Duration::from_millis(h.challenge_poll_ms),
            retry_poll: Duration::from_millis(h.retry_poll_ms),
            min_links: h.min_links,
            source_scan_threshold: h.source_scan_threshold,
            fallback_threshold: h.fallback_threshold,
            retry_attempts: h.retry_attempts,
            retry_backoff: Duration::from_millis(h.retry_backoff_ms),
            skip_domains: h.skip_domains.clone(),
            extra_source_skip_domains: h.extra_source_skip_domains.clone(),
        }
    }
}

/// Runtime prepare configuration.
#[derive(Debug, Clone)]
pub struct PrepareConfig {
    pub urls_path: PathBuf,
    pub ledger_path: PathBuf,
    pub timeout: Duration,
    pub rate_limit: Duration,
    pub rate_jitter: Duration,
}

impl From<&AppConfig> for PrepareConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            urls_path: PathBuf::from(&config.files.urls_file),
            ledger_path: PathBuf::from(&config.files.ledger_file),
            timeout: Duration::from_secs(config.prepare.timeout_secs),
            rate_limit: Duration::from_millis(config.prepare.rate_limit_ms),
            rate_jitter: Duration::from_millis(config.prepare.rate_jitter_ms),
        }
    }
}

/// Runtime mail configuration.
#[derive(Debug, Clone)]
pub struct MailSettings {
    pub ledger_path: PathBuf,
    pub attachment_path: PathBuf,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub batch_size: usize,
    pub delay: Duration,
    pub sender_name: String,
    pub subject_template: String,
    pub body_template: String,
}

impl From<&AppConfig> for MailSettings {
    fn from(config: &AppConfig) -> Self {
        let m = &config.mail;
        Self {
            ledger_path: PathBuf::from(&config.files.ledger_file),
            attachment_path: PathBuf::from(&config.files.attachment),
            smtp_host: m.smtp_host.clone(),
            smtp_port: m.smtp_port,
            batch_size: m.batch_size,
            delay: Duration::from_secs(m.delay_secs),
            sender_name: m.sender_name.clone(),
            subject_template: m.subject_template.clone(),
            body_template: m.body_template.clone(),
        }
    }
}

/// SMTP login read from the environment (or `.env`).
#[derive(Clone)]
pub struct MailCredentials {
    pub user: String,
    pub password: String,
}

impl std::fmt::Debug for MailCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailCredentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.outreach/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| OutreachError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.outreach/outreach.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| OutreachError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| OutreachError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| OutreachError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| OutreachError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| OutreachError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the SMTP login from the env vars named in `[mail]`.
pub fn load_credentials(config: &AppConfig) -> Result<MailCredentials> {
    let read = |name: &str| match std::env::var(name) {
        Ok(val) if !val.trim().is_empty() => Ok(val),
        _ => Err(OutreachError::config(format!(
            "{} and {} must be set (in the environment or a .env file). \
             {name} is missing.",
            config.mail.user_env, config.mail.pass_env
        ))),
    };

    Ok(MailCredentials {
        user: read(&config.mail.user_env)?,
        password: read(&config.mail.pass_env)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("ledger_file"));
        assert!(toml_str.contains("EMAIL_USER"));
        assert!(toml_str.contains("smtp.gmail.com"));
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[files]
ledger_file = "/tmp/leads.csv"

[mail]
batch_size = 5
sender_name = "Sam Doe"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.files.ledger_file, "/tmp/leads.csv");
        assert_eq!(config.files.urls_file, "ai_company_urls.txt");
        assert_eq!(config.mail.batch_size, 5);
        assert_eq!(config.mail.delay_secs, 10);
        assert_eq!(config.harvest.max_urls, 500);
        assert!(config.harvest.skip_domains.contains(&"github.com".to_string()));
    }

    #[test]
    fn runtime_configs_from_app_config() {
        let app = AppConfig::default();

        let harvest = HarvestConfig::from(&app);
        assert_eq!(harvest.challenge_timeout, Duration::from_secs(30));
        assert_eq!(harvest.challenge_poll, Duration::from_secs(2));
        assert_eq!(harvest.min_links, 5);

        let prepare = PrepareConfig::from(&app);
        assert_eq!(prepare.timeout, Duration::from_secs(20));
        assert_eq!(prepare.ledger_path, PathBuf::from("companies.csv"));

        let mail = MailSettings::from(&app);
        assert_eq!(mail.batch_size, 50);
        assert_eq!(mail.delay, Duration::from_secs(10));
        assert_eq!(mail.smtp_port, 465);
    }

    #[test]
    fn missing_credentials_are_reported() {
        let mut config = AppConfig::default();
        // Unique env var names to avoid interfering with other tests
        config.mail.user_env = "OUTREACH_TEST_MISSING_USER_91823".into();
        config.mail.pass_env = "OUTREACH_TEST_MISSING_PASS_91823".into();
        let err = load_credentials(&config).unwrap_err();
        assert!(err.to_string().contains("OUTREACH_TEST_MISSING_USER_91823"));
    }

    #[test]
    fn credentials_debug_hides_password() {
        let creds = MailCredentials {
            user: "me@example.com".into(),
            password: "hunter2".into(),
        };
        let debug = format!("{creds:?}");
        assert!(debug.contains("me@example.com"));
        assert!(!debug.contains("hunter2"));
    }
}
