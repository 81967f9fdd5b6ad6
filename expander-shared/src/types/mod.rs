//! Core data structures shared by the expander crates.

pub mod flattened_document;
pub mod index_command;

pub use flattened_document::FlattenedDocument;
pub use index_command::{IndexAction, IndexCommand, ObjectIdentity};
