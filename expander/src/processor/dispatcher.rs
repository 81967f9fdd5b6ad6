//! Command dispatch.
//!
//! The dispatcher is the failure boundary of the pipeline: whatever happens
//! while one message is flattened or written to a sink (an error, a missing
//! item, a panic) is logged here and the message is still completed, so one
//! bad message never stops the consumer.

use expander_shared::{flatten, IndexAction, IndexCommand};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tracing::{debug, error, info, instrument};

use crate::consumer::Completion;
use crate::errors::DispatchError;
use crate::loader::{KeyValueSink, SearchSink};
use crate::processor::command_parser;

/// How a message was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Add command written to every active sink.
    Indexed,
    /// Delete command written to the search sink.
    Deleted,
    /// Undecodable message; no sink touched.
    Skipped,
    /// Unknown action; no sink touched.
    Rejected,
    /// A sink or the flattener failed; the failure was logged.
    Failed,
}

impl DispatchOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed)
    }
}

/// Routes index commands to the active sinks.
pub struct Dispatcher {
    search: Option<SearchSink>,
    key_value: Option<KeyValueSink>,
}

impl Dispatcher {
    /// Create a dispatcher writing to the given sinks. A `None` sink is
    /// inactive for this deployment.
    pub fn new(search: Option<SearchSink>, key_value: Option<KeyValueSink>) -> Self {
        Self { search, key_value }
    }

    /// Decode a raw envelope and dispatch it.
    pub async fn handle(&self, raw: &[u8], completion: Completion) -> DispatchOutcome {
        let command = command_parser::parse(raw);
        self.dispatch(command, completion).await
    }

    /// Dispatch a command and signal `completion` once it has been handled,
    /// whatever the outcome.
    #[instrument(
        skip_all,
        fields(
            delivery_id = completion.delivery_id(),
            action = %command.action,
            object_type = %command.identity.object_type,
            object_id = %command.identity.id,
            database = %command.identity.database,
        )
    )]
    pub async fn dispatch(&self, command: IndexCommand, completion: Completion) -> DispatchOutcome {
        let outcome = match AssertUnwindSafe(self.route(&command)).catch_unwind().await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                if !e.is_sink_failure() {
                    error!(
                        object_type = %command.identity.object_type,
                        object_id = %command.identity.id,
                        database = %command.identity.database,
                        error = %e,
                        "Failed to index {}",
                        command.identity
                    );
                }
                DispatchOutcome::Failed
            }
            Err(panic) => {
                error!(
                    object_type = %command.identity.object_type,
                    object_id = %command.identity.id,
                    database = %command.identity.database,
                    panic = panic_message(panic.as_ref()),
                    "Panic while indexing {}",
                    command.identity
                );
                DispatchOutcome::Failed
            }
        };

        completion.complete(outcome.is_success());
        outcome
    }

    async fn route(&self, command: &IndexCommand) -> Result<DispatchOutcome, DispatchError> {
        match &command.action {
            IndexAction::Add => self.add(command).await,
            IndexAction::Delete => self.delete(command).await,
            IndexAction::Skip => {
                info!("not indexing this item because of malformed JSON");
                Ok(DispatchOutcome::Skipped)
            }
            IndexAction::Unknown(action) => {
                error!(
                    action = %action,
                    "cannot index object because it has an invalid action"
                );
                Ok(DispatchOutcome::Rejected)
            }
        }
    }

    async fn add(&self, command: &IndexCommand) -> Result<DispatchOutcome, DispatchError> {
        let item = command.item.as_ref().ok_or(DispatchError::MissingItem)?;
        let document = flatten(item).with_identity(&command.identity);
        debug!(field_count = document.len(), "Flattened object");

        let search = async {
            match &self.search {
                Some(sink) => sink.add(command, &document).await.map_err(DispatchError::from),
                None => Ok(()),
            }
        };
        let key_value = async {
            match &self.key_value {
                Some(sink) => sink
                    .add(&command.identity, &document)
                    .await
                    .map(|_| ())
                    .map_err(DispatchError::from),
                None => Ok(()),
            }
        };

        let (search, key_value) = tokio::join!(search, key_value);
        search?;
        key_value?;
        Ok(DispatchOutcome::Indexed)
    }

    async fn delete(&self, command: &IndexCommand) -> Result<DispatchOutcome, DispatchError> {
        if let Some(sink) = &self.search {
            sink.delete(command).await?;
        }
        if self.key_value.is_some() {
            debug!("Key-value set memberships are left in place on delete");
        }
        Ok(DispatchOutcome::Deleted)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
