//! Error types for the outreach pipeline.
//!
//! Library crates use [`OutreachError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all outreach operations.
#[derive(Debug, thiserror::Error)]
pub enum OutreachError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while fetching a directory or company page.
    #[error("network error: {0}")]
    Network(String),

    /// HTML parsing or content extraction error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// CSV ledger error (bad header, bad row, illegal status change).
    #[error("ledger error: {0}")]
    Ledger(String),

    /// Message building or SMTP delivery error.
    #[error("mail error: {0}")]
    Mail(String),

    /// SMTP server rejected the login.
    #[error("authentication error: {message}")]
    Authentication { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (unknown status, malformed URL, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, OutreachError>;

impl OutreachError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create an authentication error from any displayable message.
    pub fn authentication(msg: impl Into<String>) -> Self {
        Self::Authentication {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error means the SMTP login was refused.
    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = OutreachError::config("EMAIL_USER is not set");
        assert_eq!(err.to_string(), "config error: EMAIL_USER is not set");

        let err = OutreachError::validation("unknown status 'pending'");
        assert!(err.to_string().contains("'pending'"));
    }

    #[test]
    fn authentication_is_detectable() {
        assert!(OutreachError::authentication("535 bad credentials").is_authentication());
        assert!(!OutreachError::Mail("timeout".into()).is_authentication());
    }
}
