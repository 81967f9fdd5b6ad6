//! Search index error types.

use std::time::Duration;

use thiserror::Error;

/// Errors from search index operations.
///
/// Transport failures (`ConnectionError`, `Timeout`) and application
/// failures (`Rejected`) are kept apart; neither is retried by the sink.
#[derive(Debug, Clone, Error)]
pub enum SearchIndexError {
    /// The provider could not be built from its configuration.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// The search engine could not be reached.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The request was still outstanding when its timeout expired.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The search engine answered with a non-success status.
    #[error("Search engine rejected the update with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

impl SearchIndexError {
    /// Create a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::ConfigurationError(msg.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create a rejection error.
    pub fn rejected(status: u16, body: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            body: body.into(),
        }
    }

    /// Whether the failure happened before the search engine answered.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::ConnectionError(_) | Self::Timeout(_))
    }
}
