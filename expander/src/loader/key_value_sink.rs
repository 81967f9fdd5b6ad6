//! Key-value sink.
//!
//! Inverts a flattened document into set memberships: for every
//! (field, value) pair the object's id is added to the set stored under
//! `database \x01 type \x01 field \x01 value`, so a lookup by field value
//! yields every object id carrying it.

use expander_repository::{KeyValueError, KeyValueStore};
use expander_shared::{FlattenedDocument, ObjectIdentity};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, error, instrument};

/// Separator between the parts of a composite key.
pub const KEY_SEPARATOR: char = '\u{1}';

/// Build the composite key for one (field, value) pair of an object.
pub fn composite_key(identity: &ObjectIdentity, field: &str, value: &str) -> String {
    let mut key = String::with_capacity(
        identity.database.len() + identity.object_type.len() + field.len() + value.len() + 3,
    );
    for (index, part) in [
        identity.database.as_str(),
        identity.object_type.as_str(),
        field,
        value,
    ]
    .into_iter()
    .enumerate()
    {
        if index > 0 {
            key.push(KEY_SEPARATOR);
        }
        key.push_str(part);
    }
    key
}

/// Fans flattened documents out into set-add writes.
#[derive(Clone)]
pub struct KeyValueSink {
    store: Arc<dyn KeyValueStore>,
}

impl KeyValueSink {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Add the object's id to the set of every (field, value) pair.
    ///
    /// The reserved identity fields are skipped; the key already carries the
    /// database and type and the set member is the id. Every write is
    /// attempted even when some fail.
    ///
    /// # Returns
    ///
    /// * `Ok(usize)` - Number of set-add writes issued
    /// * `Err(KeyValueError)` - If any write failed
    #[instrument(skip_all, fields(object_id = %identity.id))]
    pub async fn add(
        &self,
        identity: &ObjectIdentity,
        document: &FlattenedDocument,
    ) -> Result<usize, KeyValueError> {
        let keys: Vec<String> = document
            .pairs()
            .filter(|(field, _)| !FlattenedDocument::is_reserved(field))
            .map(|(field, value)| composite_key(identity, field, value))
            .collect();

        let results = join_all(
            keys.iter()
                .map(|key| self.store.set_add(key, &identity.id)),
        )
        .await;

        let total = results.len();
        let mut failures = results.into_iter().filter_map(Result::err);
        let Some(first_error) = failures.next() else {
            debug!(writes = total, "Added set memberships for {identity}");
            return Ok(total);
        };
        let failed = 1 + failures.count();

        error!(
            object_type = %identity.object_type,
            object_id = %identity.id,
            database = %identity.database,
            failed,
            total,
            error = %first_error,
            "Failed to add set memberships: {identity}"
        );

        Err(KeyValueError::PartialFailure {
            failed,
            total,
            first_error: first_error.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryStore {
        calls: Mutex<Vec<(String, String)>>,
        fail_on_value: Option<&'static str>,
    }

    #[async_trait]
    impl KeyValueStore for MemoryStore {
        async fn set_add(&self, key: &str, member: &str) -> Result<(), KeyValueError> {
            self.calls
                .lock()
                .unwrap()
                .push((key.to_string(), member.to_string()));
            match self.fail_on_value {
                Some(value) if key.ends_with(value) => Err(KeyValueError::connection("refused")),
                _ => Ok(()),
            }
        }
    }

    fn identity() -> ObjectIdentity {
        ObjectIdentity::new("42", "node", "chef")
    }

    #[test]
    fn test_composite_key() {
        assert_eq!(
            composite_key(&identity(), "run_list", "a"),
            "chef\u{1}node\u{1}run_list\u{1}a"
        );
    }

    #[tokio::test]
    async fn test_fans_out_one_write_per_value() {
        let store = Arc::new(MemoryStore::default());
        let sink = KeyValueSink::new(store.clone());

        let mut doc = FlattenedDocument::new();
        doc.push("run_list", "a");
        doc.push("run_list", "b");
        let doc = doc.with_identity(&identity());

        assert_eq!(sink.add(&identity(), &doc).await.unwrap(), 2);

        let calls = store.calls.lock().unwrap();
        assert_eq!(
            *calls,
            vec![
                ("chef\x01node\x01run_list\x01a".to_string(), "42".to_string()),
                ("chef\x01node\x01run_list\x01b".to_string(), "42".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_partial_failure_still_attempts_every_write() {
        let store = Arc::new(MemoryStore {
            fail_on_value: Some("b"),
            ..Default::default()
        });
        let sink = KeyValueSink::new(store.clone());

        let mut doc = FlattenedDocument::new();
        doc.push("tags", "a");
        doc.push("tags", "b");
        doc.push("tags", "c");

        let err = sink.add(&identity(), &doc).await.unwrap_err();
        assert!(matches!(
            err,
            KeyValueError::PartialFailure {
                failed: 1,
                total: 3,
                ..
            }
        ));
        assert_eq!(store.calls.lock().unwrap().len(), 3);
    }
}
