//! Consumer module for the expander pipeline.
//!
//! Provides the broker-facing side of the pipeline: the [`Consumer`] trait
//! and its AMQP implementation.

mod amqp_consumer;
mod messages;

pub use amqp_consumer::{AmqpConsumer, AmqpSettings};
pub use messages::{Completion, InboundMessage, StreamMessage};

use async_trait::async_trait;
use expander_shared::PartitionAssignment;
use tokio::sync::{broadcast, mpsc};

use crate::errors::IngestError;

/// Name of the broker queue carrying one vnode's messages.
pub fn vnode_queue_name(vnode: u32) -> String {
    format!("vnode-{vnode}")
}

/// A source of deliveries.
///
/// The orchestrator calls [`Consumer::subscribe`] once with this node's
/// partition assignment, then drives [`Consumer::run`] on its own task.
#[async_trait]
pub trait Consumer: Send + Sync {
    /// Start consuming the vnode queues of `assignment`.
    async fn subscribe(&self, assignment: &PartitionAssignment) -> Result<(), IngestError>;

    /// Forward deliveries to `sender` and acknowledge them as
    /// acknowledgements arrive on `ack_receiver`.
    ///
    /// After `shutdown` fires no new deliveries are forwarded, but
    /// acknowledgements keep being processed until `ack_receiver` closes.
    async fn run(
        &self,
        sender: mpsc::Sender<StreamMessage>,
        ack_receiver: mpsc::UnboundedReceiver<StreamMessage>,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), IngestError>;
}
