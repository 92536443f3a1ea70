//! Stage orchestration for the outreach pipeline.
//!
//! Each stage is one entry point the CLI calls:
//! - [`run_harvest`]: directory page → URL list
//! - [`run_prepare`]: URL list → ledger rows
//! - [`run_send`]: `unsent` ledger rows → emails

pub mod harvest;
pub mod prepare;
pub mod progress;
pub mod send;

pub use harvest::{HarvestReport, run_harvest};
pub use prepare::{PrepareReport, prepare_with, run_prepare};
pub use progress::{ProgressReporter, SilentProgress};
pub use send::{BatchContext, SendReport, run_send, run_send_with, send_batch};
