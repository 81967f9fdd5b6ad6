//! Search-engine sink.

use chrono::Utc;
use expander_repository::{SearchIndexError, SearchIndexProvider};
use expander_shared::{FlattenedDocument, IndexCommand};
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Sends documents to the search index and reports each outcome.
///
/// Failures are logged here, with the object identity, and handed back to
/// the caller; they are never retried.
#[derive(Clone)]
pub struct SearchSink {
    provider: Arc<dyn SearchIndexProvider>,
}

impl SearchSink {
    pub fn new(provider: Arc<dyn SearchIndexProvider>) -> Self {
        Self { provider }
    }

    /// Index a flattened object.
    #[instrument(skip_all, fields(field_count = document.len()))]
    pub async fn add(
        &self,
        command: &IndexCommand,
        document: &FlattenedDocument,
    ) -> Result<(), SearchIndexError> {
        let result = self.provider.add_document(document).await;
        report("indexed", command, &result);
        result
    }

    /// Remove an object by id.
    #[instrument(skip_all)]
    pub async fn delete(&self, command: &IndexCommand) -> Result<(), SearchIndexError> {
        let result = self.provider.delete_document(&command.identity.id).await;
        report("deleted", command, &result);
        result
    }
}

fn report(verb: &str, command: &IndexCommand, result: &Result<(), SearchIndexError>) {
    let object = &command.identity;
    match result {
        Ok(()) => match command.transit_time(Utc::now()) {
            Some(transit_time_secs) => info!(
                object_type = %object.object_type,
                object_id = %object.id,
                database = %object.database,
                transit_time_secs,
                "{verb} {object} transit-time[{transit_time_secs}s]"
            ),
            None => info!(
                object_type = %object.object_type,
                object_id = %object.id,
                database = %object.database,
                "{verb} {object}"
            ),
        },
        Err(e) if e.is_transport() => error!(
            object_type = %object.object_type,
            object_id = %object.id,
            database = %object.database,
            error = %e,
            "Failed to post to solr (connection error): {object}"
        ),
        Err(e) => error!(
            object_type = %object.object_type,
            object_id = %object.id,
            database = %object.database,
            error = %e,
            "Failed to post to solr: {object}"
        ),
    }
}
