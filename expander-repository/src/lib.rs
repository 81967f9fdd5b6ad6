//! # Expander Repository
//!
//! Traits and implementations for the two index sinks fed by the expander:
//! a Solr search index and a Redis set store.

pub mod config;
pub mod errors;
pub mod interfaces;
pub mod keyvalue;
pub mod solr;

pub use config::{RedisConfig, SolrConfig};
pub use errors::{KeyValueError, SearchIndexError};
pub use interfaces::{KeyValueStore, SearchIndexProvider};
pub use keyvalue::RedisStore;
pub use solr::SolrProvider;
