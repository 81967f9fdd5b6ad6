//! Processor module for the expander pipeline.
//!
//! Decodes command envelopes and routes them to the sinks.

pub mod command_parser;
mod dispatcher;

pub use command_parser::parse;
pub use dispatcher::{DispatchOutcome, Dispatcher};
