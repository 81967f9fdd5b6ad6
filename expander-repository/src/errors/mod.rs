//! Error types for the expander sinks.
//!
//! One error type per sink so callers can tell a search-engine failure from
//! a key-value store failure when they log it.

mod key_value_error;
mod search_index_error;

pub use key_value_error::KeyValueError;
pub use search_index_error::SearchIndexError;
