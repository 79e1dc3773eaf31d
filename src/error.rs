//! Error types for jira-slack-tools
//!
//! This module provides the error taxonomy shared by every procedure in the crate:
//! - Transient failures (rate limits, server errors, timeouts) that the retry policy may retry
//! - Permanent failures (authorization, missing resources, bad requests)
//! - Protocol violations (a search that never stops paginating)
//! - Local failures (configuration, filesystem, decoding)

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for jira-slack-tools operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for jira-slack-tools
///
/// Each variant carries enough context (URL, status, config key) to diagnose a failed run
/// from the log line alone.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "jira.base_url")
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error (connection refused, timeout, TLS, ...)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error while writing JSON output
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A response body did not match the expected schema
    #[error("failed to decode {context}: {source}")]
    Decode {
        /// What was being decoded (e.g., "search page", "conversations.list response")
        context: String,
        /// The underlying decoder error
        #[source]
        source: serde_json::Error,
    },

    /// The server answered with a non-success status
    #[error("HTTP {status} from {url}: {body}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Requested URL
        url: String,
        /// Truncated response body, for diagnostics
        body: String,
        /// Parsed `Retry-After` header, when the server sent a numeric one
        retry_after: Option<Duration>,
    },

    /// The search endpoint kept returning continuation tokens past the page bound
    #[error("pagination did not terminate after {pages} pages")]
    PaginationOverflow {
        /// Number of pages fetched before aborting
        pages: usize,
    },

    /// Slack Web API answered `ok: false`
    #[error("Slack API {method} failed: {error}")]
    Slack {
        /// Web API method (e.g., "conversations.create")
        method: String,
        /// Slack error code (e.g., "name_taken")
        error: String,
    },

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build a configuration error for a missing required setting
    pub fn missing(key: &str) -> Self {
        Error::Config {
            message: format!("{key} is required"),
            key: Some(key.to_string()),
        }
    }

    /// HTTP status carried by this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Http { status, .. } => Some(*status),
            Error::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Errors from a single attachment transfer attempt
///
/// These never escape the attachment downloader: they drive the retry policy and end up in
/// the log, while the export carries on with the next attachment.
#[derive(Debug, Error)]
pub enum AttachmentError {
    /// Server answered with a non-200 status
    #[error("HTTP {status} downloading {url}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Attachment URL
        url: String,
        /// Truncated response body
        body: String,
        /// Parsed `Retry-After` header
        retry_after: Option<Duration>,
    },

    /// Request could not be sent or the body stream broke
    #[error("request for {url} failed: {source}")]
    Request {
        /// Attachment URL
        url: String,
        /// Underlying client error
        #[source]
        source: reqwest::Error,
    },

    /// Local write failed
    #[error("failed to write {path}: {source}")]
    Write {
        /// Destination being written
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_names_the_key() {
        let err = Error::missing("jira.base_url");
        match &err {
            Error::Config { key, .. } => assert_eq!(key.as_deref(), Some("jira.base_url")),
            other => panic!("expected Config, got {other:?}"),
        }
        assert_eq!(
            err.to_string(),
            "configuration error: jira.base_url is required"
        );
    }

    #[test]
    fn http_error_exposes_status() {
        let err = Error::Http {
            status: 503,
            url: "https://example.atlassian.net/rest/api/3/search/jql".into(),
            body: "unavailable".into(),
            retry_after: None,
        };
        assert_eq!(err.status(), Some(503));
        assert!(err.to_string().starts_with("HTTP 503 from"));
    }

    #[test]
    fn pagination_overflow_message() {
        let err = Error::PaginationOverflow { pages: 5000 };
        assert_eq!(
            err.to_string(),
            "pagination did not terminate after 5000 pages"
        );
        assert_eq!(err.status(), None);
    }

    #[test]
    fn slack_error_message() {
        let err = Error::Slack {
            method: "conversations.create".into(),
            error: "name_taken".into(),
        };
        assert_eq!(
            err.to_string(),
            "Slack API conversations.create failed: name_taken"
        );
    }
}
