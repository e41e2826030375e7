//! Error types for intelligence-report-dl
//!
//! Every workflow stage returns [`Result`]. Network and HTTP failures carry the
//! [`Stage`] they happened in so the orchestrator and the logs can say which
//! call failed without parsing messages.

use crate::types::Stage;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for intelligence-report-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Maximum number of response body bytes kept in [`Error::Http`]
pub const MAX_ERROR_BODY_LEN: usize = 512;

/// Main error type for intelligence-report-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "region")
        key: Option<String>,
    },

    /// The request never produced a response (DNS, connect, TLS, timeout)
    #[error("network error during {stage}: {source}")]
    Network {
        /// Stage that issued the request
        stage: Stage,
        /// Underlying transport error
        #[source]
        source: reqwest::Error,
    },

    /// The service answered with a non-success status
    #[error("{stage} request failed with HTTP {status}: {body}")]
    Http {
        /// Stage that issued the request
        stage: Stage,
        /// HTTP status code returned by the service
        status: u16,
        /// Response body, truncated to [`MAX_ERROR_BODY_LEN`] bytes
        body: String,
    },

    /// The service answered with a body we could not interpret
    #[error("unexpected {stage} response: {message}")]
    UnexpectedResponse {
        /// Stage that issued the request
        stage: Stage,
        /// What was wrong with the response
        message: String,
    },

    /// Downloaded report is not valid UTF-8
    #[error("report is not valid UTF-8: {0}")]
    InvalidEncoding(#[from] std::str::Utf8Error),

    /// Delimited text could not be parsed or written
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Output file exists and the collision action forbids touching it
    #[error("output file {} already exists", path.display())]
    OutputExists {
        /// The path that already exists
        path: PathBuf,
    },

    /// The listing for the report contained no instances
    #[error("no generated instances available for report {report_id}")]
    NoInstances {
        /// Report definition that was listed
        report_id: String,
    },

    /// No instance newer than the trigger appeared while waiting
    #[error("no fresh instance of report {report_id} appeared within {waited:?}")]
    StaleReport {
        /// Report definition that was triggered
        report_id: String,
        /// How long the waiter waited before giving up
        waited: Duration,
    },
}

impl Error {
    /// Create a configuration error for a specific setting
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Build an [`Error::Http`], truncating the body on a character boundary
    pub fn http(stage: Stage, status: u16, body: &str) -> Self {
        let mut end = body.len().min(MAX_ERROR_BODY_LEN);
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        Error::Http {
            stage,
            status,
            body: body[..end].to_string(),
        }
    }

    /// The workflow stage this error belongs to, if any
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::Network { stage, .. }
            | Error::Http { stage, .. }
            | Error::UnexpectedResponse { stage, .. } => Some(*stage),
            Error::NoInstances { .. } | Error::StaleReport { .. } => Some(Stage::List),
            Error::InvalidEncoding(_)
            | Error::Csv(_)
            | Error::Io(_)
            | Error::OutputExists { .. } => Some(Stage::Persist),
            Error::Config { .. } => None,
        }
    }
}
