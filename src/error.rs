// src/error.rs

//! Unified error handling for the watcher.

use std::error::Error as StdError;
use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for watcher operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Regular expression did not compile
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A search kept paginating past the configured ceiling
    #[error("Max page limit of {max_pages} reached without reaching end of search '{search}'")]
    PaginationLimitExceeded { search: String, max_pages: usize },

    /// Persisted snapshot could not be parsed; the file has been deleted
    #[error("Could not read snapshot {}, file deleted", path.display())]
    SnapshotCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Mail message could not be built or delivered
    #[error("Mail error: {0}")]
    Mail(String),

    /// Push notification was rejected
    #[error("Push notification error: {0}")]
    Push(String),

    /// Error ledger unreadable; the file has been truncated
    #[error("Error ledger {} unreadable, truncated: {message}", path.display())]
    EscalationPersistence { path: PathBuf, message: String },

    /// Escalation email could not be sent; ledger left untouched
    #[error("Failed to send error notification")]
    EscalationSend {
        #[source]
        source: Box<AppError>,
    },
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a mail delivery error.
    pub fn mail(message: impl fmt::Display) -> Self {
        Self::Mail(message.to_string())
    }

    /// Create a push delivery error.
    pub fn push(message: impl fmt::Display) -> Self {
        Self::Push(message.to_string())
    }

    /// Render the error followed by its `source()` chain, one cause per line.
    pub fn report(&self) -> String {
        let mut out = self.to_string();
        let mut source = self.source();
        while let Some(cause) = source {
            out.push_str("\n  caused by: ");
            out.push_str(&cause.to_string());
            source = cause.source();
        }
        out
    }
}

impl From<lettre::error::Error> for AppError {
    fn from(e: lettre::error::Error) -> Self {
        Self::mail(e)
    }
}

impl From<lettre::address::AddressError> for AppError {
    fn from(e: lettre::address::AddressError) -> Self {
        Self::mail(e)
    }
}

impl From<lettre::transport::smtp::Error> for AppError {
    fn from(e: lettre::transport::smtp::Error) -> Self {
        Self::mail(e)
    }
}
