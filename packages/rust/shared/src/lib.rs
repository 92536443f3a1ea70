//! Shared types, error model, and configuration for the outreach pipeline.
//!
//! This crate is the foundation depended on by all other outreach crates.
//! It provides:
//! - [`OutreachError`]: the unified error type
//! - Domain types ([`CompanyRecord`], [`RecordStatus`])
//! - Configuration ([`AppConfig`], [`HarvestConfig`], [`PrepareConfig`],
//!   [`MailSettings`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, FilesConfig, HarvestConfig, HarvestSection, MailCredentials, MailSection,
    MailSettings, PrepareConfig, PrepareSection, config_dir, config_file_path, init_config,
    load_config, load_config_from, load_credentials,
};
pub use error::{OutreachError, Result};
pub use types::{
    CompanyRecord, LEDGER_HEADERS, NO_EMAIL_PLACEHOLDER, RecordStatus, SCRAPING_ERROR_TITLE,
    company_name_from_url,
};
