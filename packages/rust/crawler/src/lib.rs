//! Company page fetching and contact extraction for the prepare stage.
//!
//! This crate provides:
//! - [`ContactScraper`]: fetches one company URL and builds its ledger record
//! - [`extract`]: `<title>` and email address extraction

pub mod engine;
pub mod extract;

pub use engine::{ContactScraper, PageContacts};
pub use extract::{extract_emails, extract_title};
