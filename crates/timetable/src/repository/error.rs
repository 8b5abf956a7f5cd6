//! Error types for the schedule repository.

use thiserror::Error;

/// Errors that can occur while talking to a schedule repository.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// Network/HTTP request failed before a response arrived
    #[error("Network error: {message}")]
    Network { message: String },

    /// The repository refused the request; `message` is its own wording
    #[error("{message}")]
    Rejected { status: u16, message: String },

    /// The referenced schedule does not exist
    #[error("Schedule not found: {message}")]
    NotFound { message: String },

    /// Server returned something we could not interpret
    #[error("Unexpected response: {message}")]
    UnexpectedResponse { message: String },

    /// A stored or received record violates the record invariants
    #[error("Invalid schedule record: {message}")]
    InvalidRecord { message: String },

    /// Local storage failure
    #[error("Storage error: {message}")]
    Storage { message: String },

    /// URL parsing/construction failed
    #[error("URL error: {message}")]
    UrlError { message: String },
}

impl RepositoryError {
    pub(crate) fn invalid_record(message: impl Into<String>) -> Self {
        RepositoryError::InvalidRecord {
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RepositoryError::NotFound { .. })
    }

    /// Returns true if this error is potentially transient.
    ///
    /// The engine never retries by itself; this only informs what the
    /// operator is told.
    pub fn is_retryable(&self) -> bool {
        match self {
            RepositoryError::Network { .. } | RepositoryError::UnexpectedResponse { .. } => true,
            RepositoryError::Rejected { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for RepositoryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RepositoryError::UnexpectedResponse {
                message: err.to_string(),
            }
        } else {
            RepositoryError::Network {
                message: err.to_string(),
            }
        }
    }
}

impl From<url::ParseError> for RepositoryError {
    fn from(err: url::ParseError) -> Self {
        RepositoryError::UrlError {
            message: err.to_string(),
        }
    }
}

impl From<rusqlite::Error> for RepositoryError {
    fn from(err: rusqlite::Error) -> Self {
        RepositoryError::Storage {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::InvalidRecord {
            message: err.to_string(),
        }
    }
}
