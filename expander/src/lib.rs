//! # Expander
//!
//! Partitioned indexing worker: consumes object change commands from this
//! node's vnode queues and indexes them into Solr and, optionally, Redis.
//!
//! ## Architecture
//!
//! The expander follows the Consumer-Processor-Loader pattern:
//!
//! 1. **Consumer**: Receives deliveries from the AMQP vnode queues
//! 2. **Processor**: Parses command envelopes and dispatches on their action
//! 3. **Loader**: Writes flattened objects to the search and key-value sinks
//! 4. **Orchestrator**: Coordinates the ingest flow and acknowledgements
//!
//! ## Modules
//!
//! - [`config`]: Configuration and dependency initialization
//! - [`consumer`]: AMQP consumer for vnode queues
//! - [`processor`]: Command parsing and dispatch
//! - [`loader`]: Search and key-value sinks
//! - [`orchestrator`]: Coordinates the ingest flow
//! - [`errors`]: Error types for the expander

pub mod config;
pub mod consumer;
pub mod errors;
pub mod loader;
pub mod orchestrator;
pub mod processor;

pub use config::{Cli, Config, Dependencies};
pub use errors::{ConfigError, IngestError};

use thiserror::Error;

/// Errors that can occur during expander initialization or execution.
#[derive(Error, Debug)]
pub enum IndexingError {
    /// Configuration error.
    #[error("Invalid configuration: {0}")]
    ConfigError(#[from] ConfigError),

    /// A backing service could not be reached.
    #[error("Failed to connect to {service}: {message}")]
    ConnectionError {
        service: &'static str,
        message: String,
    },

    /// Ingest error.
    #[error("Ingest error: {0}")]
    IngestError(#[from] IngestError),
}

impl IndexingError {
    /// Create a connection error.
    pub fn connection(service: &'static str, message: impl Into<String>) -> Self {
        Self::ConnectionError {
            service,
            message: message.into(),
        }
    }
}
