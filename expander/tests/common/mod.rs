//! Mock consumer and sinks shared by the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc};

use expander::consumer::{Consumer, InboundMessage, StreamMessage};
use expander::errors::IngestError;
use expander::loader::{KeyValueSink, SearchSink};
use expander::processor::Dispatcher;
use expander_repository::{KeyValueError, KeyValueStore, SearchIndexError, SearchIndexProvider};
use expander_shared::{FlattenedDocument, PartitionAssignment};

/// How the mock search provider answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchBehavior {
    Accept,
    Refuse,
    Reject,
    Panic,
}

/// Records every document posted to it.
pub struct MockSearchProvider {
    behavior: SearchBehavior,
    pub added: Mutex<Vec<FlattenedDocument>>,
    pub deleted: Mutex<Vec<String>>,
}

impl MockSearchProvider {
    pub fn new(behavior: SearchBehavior) -> Self {
        Self {
            behavior,
            added: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
        }
    }

    pub fn added_count(&self) -> usize {
        self.added.lock().unwrap().len()
    }

    pub fn deleted_count(&self) -> usize {
        self.deleted.lock().unwrap().len()
    }

    fn answer(&self) -> Result<(), SearchIndexError> {
        match self.behavior {
            SearchBehavior::Accept => Ok(()),
            SearchBehavior::Refuse => Err(SearchIndexError::connection("connection refused")),
            SearchBehavior::Reject => Err(SearchIndexError::rejected(400, "bad request")),
            SearchBehavior::Panic => panic!("search provider exploded"),
        }
    }
}

#[async_trait::async_trait]
impl SearchIndexProvider for MockSearchProvider {
    async fn add_document(&self, document: &FlattenedDocument) -> Result<(), SearchIndexError> {
        self.added.lock().unwrap().push(document.clone());
        self.answer()
    }

    async fn delete_document(&self, id: &str) -> Result<(), SearchIndexError> {
        self.deleted.lock().unwrap().push(id.to_string());
        self.answer()
    }
}

/// In-memory set store.
#[derive(Default)]
pub struct MemoryStore {
    pub set_adds: Mutex<Vec<(String, String)>>,
    pub refuse: bool,
}

impl MemoryStore {
    pub fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::default()
        }
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .set_adds
            .lock()
            .unwrap()
            .iter()
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }
}

#[async_trait::async_trait]
impl KeyValueStore for MemoryStore {
    async fn set_add(&self, key: &str, member: &str) -> Result<(), KeyValueError> {
        self.set_adds
            .lock()
            .unwrap()
            .push((key.to_string(), member.to_string()));
        if self.refuse {
            Err(KeyValueError::connection("connection refused"))
        } else {
            Ok(())
        }
    }
}

/// A dispatcher over mock sinks, plus handles to inspect them.
pub struct Harness {
    pub search: Arc<MockSearchProvider>,
    pub store: Arc<MemoryStore>,
    pub dispatcher: Dispatcher,
}

impl Harness {
    pub fn new(behavior: SearchBehavior, store: MemoryStore) -> Self {
        let search = Arc::new(MockSearchProvider::new(behavior));
        let store = Arc::new(store);
        let dispatcher = Dispatcher::new(
            Some(SearchSink::new(search.clone())),
            Some(KeyValueSink::new(store.clone())),
        );
        Self {
            search,
            store,
            dispatcher,
        }
    }

    pub fn accepting() -> Self {
        Self::new(SearchBehavior::Accept, MemoryStore::default())
    }
}

/// Consumer that delivers a fixed list of payloads.
pub struct MockConsumer {
    payloads: Vec<Vec<u8>>,
    error_on_subscribe: bool,
    /// Keep the stream open until shutdown instead of ending it.
    hold_open: bool,
    pub subscribed: Mutex<Option<PartitionAssignment>>,
    pub acknowledged: Arc<Mutex<Vec<(u64, bool)>>>,
}

impl MockConsumer {
    pub fn new(payloads: Vec<Vec<u8>>) -> Self {
        Self {
            payloads,
            error_on_subscribe: false,
            hold_open: false,
            subscribed: Mutex::new(None),
            acknowledged: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_subscribe_error() -> Self {
        Self {
            error_on_subscribe: true,
            ..Self::new(Vec::new())
        }
    }

    pub fn held_open(payloads: Vec<Vec<u8>>) -> Self {
        Self {
            hold_open: true,
            ..Self::new(payloads)
        }
    }

    pub fn acknowledgments(&self) -> Vec<(u64, bool)> {
        let mut acks = self.acknowledged.lock().unwrap().clone();
        acks.sort();
        acks
    }
}

#[async_trait::async_trait]
impl Consumer for MockConsumer {
    async fn subscribe(&self, assignment: &PartitionAssignment) -> Result<(), IngestError> {
        if self.error_on_subscribe {
            return Err(IngestError::broker("Mock subscribe error"));
        }
        *self.subscribed.lock().unwrap() = Some(assignment.clone());
        Ok(())
    }

    async fn run(
        &self,
        sender: mpsc::Sender<StreamMessage>,
        mut ack_receiver: mpsc::UnboundedReceiver<StreamMessage>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), IngestError> {
        for (delivery_id, payload) in self.payloads.iter().enumerate() {
            let _ = sender
                .send(StreamMessage::Delivery(InboundMessage {
                    delivery_id: delivery_id as u64,
                    queue: "vnode-0".to_string(),
                    payload: payload.clone(),
                }))
                .await;
        }

        if self.hold_open {
            let _ = shutdown.recv().await;
            let _ = sender.try_send(StreamMessage::End);
        } else {
            let _ = sender.send(StreamMessage::End).await;
        }

        while let Some(message) = ack_receiver.recv().await {
            if let StreamMessage::Acknowledgment {
                delivery_id,
                success,
            } = message
            {
                self.acknowledged.lock().unwrap().push((delivery_id, success));
            }
        }

        Ok(())
    }
}

pub fn add_payload(id: &str, item: &str) -> Vec<u8> {
    format!(
        r#"{{"action":"add","payload":{{"id":"{id}","type":"node","database":"chef","item":{item},"enqueued_at":1300000000}}}}"#
    )
    .into_bytes()
}

pub fn delete_payload(id: &str) -> Vec<u8> {
    format!(
        r#"{{"action":"delete","payload":{{"id":"{id}","type":"node","database":"chef","enqueued_at":1300000000}}}}"#
    )
    .into_bytes()
}
