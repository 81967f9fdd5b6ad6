//! Search index provider trait definition.

use async_trait::async_trait;
use expander_shared::FlattenedDocument;

use crate::errors::SearchIndexError;

/// Abstracts the full-text search engine.
///
/// Implementations make exactly one attempt per call and bound it with their
/// own timeout. They never retry.
#[async_trait]
pub trait SearchIndexProvider: Send + Sync {
    /// Add (or replace) a document.
    ///
    /// The document must already carry its reserved identity fields.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The engine accepted the document
    /// * `Err(SearchIndexError)` - Transport failure, timeout or rejection
    async fn add_document(&self, document: &FlattenedDocument) -> Result<(), SearchIndexError>;

    /// Delete the document with the given id.
    ///
    /// Deleting an id the engine does not know is not an error.
    async fn delete_document(&self, id: &str) -> Result<(), SearchIndexError>;
}
