//! Message types for the consumer.
//!
//! Defines the deliveries that flow from the broker into the pipeline and
//! the acknowledgements that flow back.

use tokio::sync::mpsc;
use tracing::warn;

/// A raw delivery taken off one of this node's vnode queues.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Consumer-assigned id used to route the acknowledgement back.
    pub delivery_id: u64,
    /// The queue the delivery came from.
    pub queue: String,
    /// The undecoded command envelope.
    pub payload: Vec<u8>,
}

/// Messages that flow between the consumer and the orchestrator.
#[derive(Debug)]
pub enum StreamMessage {
    /// A delivery to dispatch.
    Delivery(InboundMessage),
    /// A delivery has been handled and may be acknowledged to the broker.
    Acknowledgment { delivery_id: u64, success: bool },
    /// Stream has ended.
    End,
    /// An error occurred.
    Error(String),
}

/// Completion signal for one delivery.
///
/// Consumed by [`Completion::complete`], so a delivery is acknowledged at most
/// once; dropping an uncompleted `Completion` (for example while unwinding)
/// still acknowledges it, marked unsuccessful, so it is acknowledged at least
/// once as well.
#[derive(Debug)]
pub struct Completion {
    delivery_id: u64,
    ack_sender: Option<mpsc::UnboundedSender<StreamMessage>>,
}

impl Completion {
    pub fn new(delivery_id: u64, ack_sender: mpsc::UnboundedSender<StreamMessage>) -> Self {
        Self {
            delivery_id,
            ack_sender: Some(ack_sender),
        }
    }

    /// A completion nobody listens to.
    pub fn detached(delivery_id: u64) -> Self {
        Self {
            delivery_id,
            ack_sender: None,
        }
    }

    pub fn delivery_id(&self) -> u64 {
        self.delivery_id
    }

    /// Signal that the delivery has been handled.
    pub fn complete(mut self, success: bool) {
        self.send(success);
    }

    fn send(&mut self, success: bool) {
        if let Some(sender) = self.ack_sender.take() {
            let acknowledgment = StreamMessage::Acknowledgment {
                delivery_id: self.delivery_id,
                success,
            };
            if sender.send(acknowledgment).is_err() {
                warn!(
                    delivery_id = self.delivery_id,
                    "Acknowledgment channel closed before delivery completed"
                );
            }
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        self.send(false);
    }
}
