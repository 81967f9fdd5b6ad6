//! Interface definitions for the expander sinks.
//!
//! The traits here allow dependency injection: the pipeline only ever talks
//! to a `dyn SearchIndexProvider` or `dyn KeyValueStore`, so tests swap in
//! in-memory implementations.

mod key_value_store;
mod search_index_provider;

pub use key_value_store::KeyValueStore;
pub use search_index_provider::SearchIndexProvider;
