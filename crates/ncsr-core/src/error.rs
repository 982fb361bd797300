//! Error types for pipeline operations.
//!
//! This module defines [`NcsrError`] which covers all error cases that can occur
//! when searching for filings, converting them, reading the reference table,
//! or exporting a report.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during pipeline operations.
#[derive(Error, Debug)]
pub enum NcsrError {
    /// Network-related errors (connection failures, timeouts, etc.).
    #[error("Network error: {0}")]
    Network(String),

    /// The endpoint answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Http {
        /// Status code returned by the endpoint.
        status: u16,
        /// The URL that was requested.
        url: String,
    },

    /// Rate limit exceeded by the vendor.
    #[error("Rate limited by {0}")]
    RateLimited(String),

    /// The vendor rejected the API key.
    #[error("Authentication failed for provider {0}")]
    AuthenticationFailed(String),

    /// Error parsing data returned by an endpoint.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The reference file does not exist.
    #[error("Required reference file '{}' is missing", .0.display())]
    MissingReferenceFile(PathBuf),

    /// The reference file lacks required columns.
    #[error("Reference file '{}' is missing required columns: {}", path.display(), columns.join(", "))]
    MissingColumns {
        /// Path of the reference file.
        path: PathBuf,
        /// Canonical names of the missing columns.
        columns: Vec<String>,
    },

    /// An invalid parameter was provided.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Error reading or writing delimited text.
    #[error("CSV error: {0}")]
    Csv(String),

    /// Filesystem error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other error.
    #[error("{0}")]
    Other(String),
}

impl From<csv::Error> for NcsrError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err.to_string())
    }
}

/// Result type alias using [`NcsrError`].
pub type Result<T> = std::result::Result<T, NcsrError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_columns_message_names_columns() {
        let err = NcsrError::MissingColumns {
            path: PathBuf::from("class_series_mapping.csv"),
            columns: vec!["classId".to_string(), "seriesId".to_string()],
        };
        let message = err.to_string();
        assert!(message.contains("class_series_mapping.csv"));
        assert!(message.contains("classId, seriesId"));
    }

    #[test]
    fn test_http_message() {
        let err = NcsrError::Http {
            status: 500,
            url: "https://api.sec-api.io".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 500 from https://api.sec-api.io");
    }
}
