//! Error types for icecat-dl
//!
//! Two families of errors live here:
//! - [`Error`], the fatal error returned from library operations (configuration,
//!   reference/index retrieval, output writing, per-request transport failures)
//! - Soft, per-record failures ([`LookupError`], [`UnrollError`]) that callers
//!   handle with an explicit branch and log instead of aborting the batch

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for icecat-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for icecat-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "download.concurrency")
        key: Option<String>,
    },

    /// A detail field selector could not be parsed
    #[error("invalid field selector: {0}")]
    InvalidSelector(String),

    /// The catalog index document is structurally unusable
    #[error("invalid catalog index: {0}")]
    InvalidIndex(String),

    /// A reference document (categories, suppliers) is structurally unusable
    #[error("invalid reference list {name}: {reason}")]
    InvalidReference {
        /// Which reference list failed (e.g., "CategoriesList.xml.gz")
        name: String,
        /// Why it was rejected
        reason: String,
    },

    /// XML document was not well-formed
    #[error("XML parse error: {0}")]
    Xml(#[from] roxmltree::Error),

    /// Remote server answered with a non-success status
    #[error("HTTP {status} fetching {url}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Requested URL
        url: String,
    },

    /// A URL could not be built from a base and a catalog path
    #[error("invalid URL {url}: {reason}")]
    InvalidUrl {
        /// The URL (or path) that was rejected
        url: String,
        /// Parser message
        reason: String,
    },

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// I/O error tied to a specific file
    #[error("I/O error on {path}: {source}")]
    File {
        /// File that was being read, written or removed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A background task panicked or was cancelled
    #[error("task failed: {0}")]
    Task(String),
}

impl Error {
    /// Build a [`Error::Config`] for a specific configuration key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Wrap an I/O error with the path it happened on
    pub fn file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::File {
            path: path.into(),
            source,
        }
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(e: tokio::task::JoinError) -> Self {
        Error::Task(e.to_string())
    }
}

/// Failure to resolve an id in a reference table
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    /// The id is not present in the table
    #[error("{table} id {id} not found")]
    NotFound {
        /// Table name ("category" or "supplier")
        table: &'static str,
        /// The id that was looked up
        id: String,
    },

    /// The record carries no id field to look up
    #[error("record has no {field} field")]
    MissingField {
        /// Name of the absent field
        field: &'static str,
    },
}

/// Failure to normalize a multi-value identifier structure (EAN/UPC codes)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnrollError {
    /// The wrapper has no repeated child element
    #[error("missing {0} element")]
    MissingChild(&'static str),

    /// An entry is not a map carrying a scalar value
    #[error("entry {index} has no scalar value")]
    NoValue {
        /// Position of the offending entry
        index: usize,
    },

    /// The structure is neither a single entry, a list of entries, nor a flat list
    #[error("unexpected shape: {0}")]
    UnexpectedShape(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_carries_key() {
        let err = Error::config("download.concurrency", "must be positive");
        match &err {
            Error::Config { key, message } => {
                assert_eq!(key.as_deref(), Some("download.concurrency"));
                assert_eq!(message, "must be positive");
            }
            other => panic!("expected Config error, got {:?}", other),
        }
        assert_eq!(err.to_string(), "configuration error: must be positive");
    }

    #[test]
    fn http_error_display_names_status_and_url() {
        let err = Error::Http {
            status: 404,
            url: "https://data.icecat.biz/x.xml".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 404 fetching https://data.icecat.biz/x.xml");
    }

    #[test]
    fn file_error_names_path() {
        let err = Error::file(
            "/tmp/missing.xml",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        let msg = err.to_string();
        assert!(msg.contains("/tmp/missing.xml"), "got: {}", msg);
        assert!(msg.contains("gone"), "got: {}", msg);
    }

    #[test]
    fn lookup_error_messages() {
        let err = LookupError::NotFound {
            table: "category",
            id: "575".to_string(),
        };
        assert_eq!(err.to_string(), "category id 575 not found");
        assert_eq!(
            LookupError::MissingField { field: "catid" }.to_string(),
            "record has no catid field"
        );
    }

    #[test]
    fn unroll_error_messages() {
        assert_eq!(
            UnrollError::MissingChild("ean_upc").to_string(),
            "missing ean_upc element"
        );
        assert_eq!(
            UnrollError::NoValue { index: 2 }.to_string(),
            "entry 2 has no scalar value"
        );
    }
}
