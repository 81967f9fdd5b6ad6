//! Loader module for the expander pipeline.
//!
//! Wraps the repository providers with the per-object logging and fan-out
//! the pipeline needs.

mod key_value_sink;
mod search_sink;

pub use key_value_sink::{composite_key, KeyValueSink, KEY_SEPARATOR};
pub use search_sink::SearchSink;
