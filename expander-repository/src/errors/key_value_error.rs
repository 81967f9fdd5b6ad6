//! Key-value store error types.

use thiserror::Error;

/// Errors from key-value store operations.
#[derive(Debug, Clone, Error)]
pub enum KeyValueError {
    /// The store could not be reached.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The store answered the command with an error.
    #[error("Command error: {0}")]
    CommandError(String),

    /// Some writes of a fan-out failed.
    #[error("{failed} of {total} set-add operations failed: {first_error}")]
    PartialFailure {
        failed: usize,
        total: usize,
        first_error: String,
    },
}

impl KeyValueError {
    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create a command error.
    pub fn command(msg: impl Into<String>) -> Self {
        Self::CommandError(msg.into())
    }
}

impl From<redis::RedisError> for KeyValueError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error() || err.is_connection_refusal() || err.is_connection_dropped() {
            Self::ConnectionError(err.to_string())
        } else {
            Self::CommandError(err.to_string())
        }
    }
}
