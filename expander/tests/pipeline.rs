//! End-to-end dispatch tests: raw envelopes through parsing, flattening and
//! both sinks, with mock providers.

mod common;

use tokio::sync::mpsc;

use common::{add_payload, delete_payload, Harness, MemoryStore, SearchBehavior};
use expander::consumer::{Completion, StreamMessage};
use expander::processor::DispatchOutcome;
use expander_shared::types::flattened_document::{DATABASE_FIELD, ID_FIELD, TYPE_FIELD};

/// Dispatch one raw message and return its outcome and acknowledgement.
async fn dispatch(harness: &Harness, raw: &[u8]) -> (DispatchOutcome, Option<bool>) {
    let (ack_tx, mut ack_rx) = mpsc::unbounded_channel();
    let outcome = harness
        .dispatcher
        .handle(raw, Completion::new(7, ack_tx))
        .await;

    let ack = match ack_rx.try_recv() {
        Ok(StreamMessage::Acknowledgment {
            delivery_id,
            success,
        }) => {
            assert_eq!(delivery_id, 7);
            Some(success)
        }
        _ => None,
    };
    assert!(ack_rx.try_recv().is_err(), "delivery acknowledged twice");
    (outcome, ack)
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[tokio::test]
async fn test_add_indexes_into_both_sinks() {
    let harness = Harness::accepting();

    let (outcome, ack) = dispatch(&harness, &add_payload("42", r#"{"run_list":["a","b"]}"#)).await;

    assert_eq!(outcome, DispatchOutcome::Indexed);
    assert_eq!(ack, Some(true));

    let added = harness.search.added.lock().unwrap();
    assert_eq!(added.len(), 1);
    let document = &added[0];
    assert_eq!(document.get("run_list"), Some(strings(&["a", "b"]).as_slice()));
    assert_eq!(document.get(ID_FIELD), Some(strings(&["42"]).as_slice()));
    assert_eq!(document.get(TYPE_FIELD), Some(strings(&["node"]).as_slice()));
    assert_eq!(document.get(DATABASE_FIELD), Some(strings(&["chef"]).as_slice()));
    assert_eq!(document.len(), 4);

    assert_eq!(
        harness.store.keys(),
        vec![
            "chef\x01node\x01run_list\x01a".to_string(),
            "chef\x01node\x01run_list\x01b".to_string(),
        ]
    );
    assert!(harness
        .store
        .set_adds
        .lock()
        .unwrap()
        .iter()
        .all(|(_, member)| member == "42"));
}

#[tokio::test]
async fn test_numeric_id_is_stringified() {
    let harness = Harness::accepting();
    let raw = br#"{"action":"add","payload":{"id":42,"type":"role","database":"chef","item":{"name":"web"}}}"#;

    let (outcome, _) = dispatch(&harness, raw).await;

    assert_eq!(outcome, DispatchOutcome::Indexed);
    let added = harness.search.added.lock().unwrap();
    assert_eq!(added[0].get(ID_FIELD), Some(strings(&["42"]).as_slice()));
}

#[tokio::test]
async fn test_delete_touches_only_search_sink() {
    let harness = Harness::accepting();

    let (outcome, ack) = dispatch(&harness, &delete_payload("2342")).await;

    assert_eq!(outcome, DispatchOutcome::Deleted);
    assert_eq!(ack, Some(true));
    assert_eq!(*harness.search.deleted.lock().unwrap(), vec!["2342".to_string()]);
    assert_eq!(harness.search.added_count(), 0);
    assert!(harness.store.set_adds.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_ignores_item() {
    let harness = Harness::accepting();
    let raw = br#"{"action":"delete","payload":{"id":"9","type":"node","database":"chef","item":{"huge":"object"}}}"#;

    let (outcome, _) = dispatch(&harness, raw).await;

    assert_eq!(outcome, DispatchOutcome::Deleted);
    assert_eq!(harness.search.added_count(), 0);
    assert_eq!(harness.search.deleted_count(), 1);
}

#[tokio::test]
async fn test_malformed_messages_are_skipped() {
    for raw in [
        b"not json at all".as_slice(),
        b"[1, 2, 3]".as_slice(),
        b"".as_slice(),
    ] {
        let harness = Harness::accepting();

        let (outcome, ack) = dispatch(&harness, raw).await;

        assert_eq!(outcome, DispatchOutcome::Skipped);
        assert_eq!(ack, Some(true));
        assert_eq!(harness.search.added_count(), 0);
        assert_eq!(harness.search.deleted_count(), 0);
        assert!(harness.store.set_adds.lock().unwrap().is_empty());
    }
}

#[tokio::test]
async fn test_unknown_action_is_rejected_without_side_effects() {
    let harness = Harness::accepting();
    let raw = br#"{"action":"upsert","payload":{"id":"1","type":"node","database":"chef","item":{"a":1}}}"#;

    let (outcome, ack) = dispatch(&harness, raw).await;

    assert_eq!(outcome, DispatchOutcome::Rejected);
    assert_eq!(ack, Some(true));
    assert_eq!(harness.search.added_count(), 0);
    assert!(harness.store.set_adds.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_add_without_item_fails_but_is_acknowledged() {
    let harness = Harness::accepting();

    let raw = br#"{"action":"add","payload":{"id":"1","type":"node","database":"chef"}}"#;

    let (outcome, ack) = dispatch(&harness, raw).await;

    assert_eq!(outcome, DispatchOutcome::Failed);
    assert_eq!(ack, Some(false));
    assert_eq!(harness.search.added_count(), 0);
}

#[tokio::test]
async fn test_search_transport_failure_is_contained() {
    let harness = Harness::new(SearchBehavior::Refuse, MemoryStore::default());

    let (outcome, ack) = dispatch(&harness, &add_payload("42", r#"{"a":"b"}"#)).await;

    assert_eq!(outcome, DispatchOutcome::Failed);
    assert_eq!(ack, Some(false));
    // The other sink is still written.
    assert_eq!(harness.store.keys(), vec!["chef\x01node\x01a\x01b".to_string()]);
}

#[tokio::test]
async fn test_search_rejection_is_contained() {
    let harness = Harness::new(SearchBehavior::Reject, MemoryStore::default());

    let (outcome, ack) = dispatch(&harness, &delete_payload("42")).await;

    assert_eq!(outcome, DispatchOutcome::Failed);
    assert_eq!(ack, Some(false));
}

#[tokio::test]
async fn test_key_value_failure_is_contained() {
    let harness = Harness::new(SearchBehavior::Accept, MemoryStore::refusing());

    let (outcome, ack) = dispatch(&harness, &add_payload("42", r#"{"tags":["x","y"]}"#)).await;

    assert_eq!(outcome, DispatchOutcome::Failed);
    assert_eq!(ack, Some(false));
    assert_eq!(harness.search.added_count(), 1);
    assert_eq!(harness.store.set_adds.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_panicking_sink_is_caught_and_acknowledged() {
    let harness = Harness::new(SearchBehavior::Panic, MemoryStore::default());

    let (outcome, ack) = dispatch(&harness, &add_payload("42", r#"{"a":"b"}"#)).await;

    assert_eq!(outcome, DispatchOutcome::Failed);
    assert_eq!(ack, Some(false));

    // The dispatcher keeps working afterwards.
    let (outcome, _) = dispatch(&harness, b"garbage").await;
    assert_eq!(outcome, DispatchOutcome::Skipped);
}

#[tokio::test]
async fn test_markup_in_values_reaches_sink_verbatim() {
    let harness = Harness::accepting();

    dispatch(
        &harness,
        &add_payload("42", r#"{"name":"</field><field name=\"x\">"}"#),
    )
    .await;

    let added = harness.search.added.lock().unwrap();
    assert_eq!(
        added[0].get("name"),
        Some(strings(&["</field><field name=\"x\">"]).as_slice())
    );
}
