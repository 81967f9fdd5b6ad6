//! Error types for the expander pipeline.

use std::path::PathBuf;

use expander_repository::{KeyValueError, SearchIndexError};
use expander_shared::TopologyError;
use thiserror::Error;

/// Errors raised while loading or validating configuration.
///
/// All of them are fatal at start-up.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The ring position is missing or inconsistent.
    #[error("{0}")]
    InvalidTopology(#[from] TopologyError),

    /// A setting holds a value its validator rejects.
    #[error("Invalid value {value:?} for {name}: {reason}")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },

    /// A required setting has no value.
    #[error("Missing value for {0}")]
    MissingValue(&'static str),

    /// The settings file could not be read.
    #[error("Failed to read settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The settings file is not valid TOML.
    #[error("Failed to parse settings file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

impl ConfigError {
    /// Create an invalid-value error.
    pub fn invalid(name: &'static str, value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            name,
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Whether this is a missing settings file.
    pub fn is_file_not_found(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

/// Errors that can stop the consume loop.
#[derive(Error, Debug)]
pub enum IngestError {
    /// AMQP broker error.
    #[error("Broker error: {0}")]
    BrokerError(String),
}

impl IngestError {
    /// Create a broker error.
    pub fn broker(msg: impl Into<String>) -> Self {
        Self::BrokerError(msg.into())
    }
}

impl From<lapin::Error> for IngestError {
    fn from(err: lapin::Error) -> Self {
        Self::BrokerError(err.to_string())
    }
}

/// Errors raised while dispatching a single message.
///
/// None of these escape the dispatch boundary; they are logged there and the
/// message is still acknowledged.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// An add command arrived without an object to index.
    #[error("add command carries no item to index")]
    MissingItem,

    /// The search sink failed.
    #[error("Search index error: {0}")]
    Search(#[from] SearchIndexError),

    /// The key-value sink failed.
    #[error("Key-value store error: {0}")]
    KeyValue(#[from] KeyValueError),
}

impl DispatchError {
    /// Sink failures are logged by the sink itself with the object identity.
    pub fn is_sink_failure(&self) -> bool {
        matches!(self, Self::Search(_) | Self::KeyValue(_))
    }
}
