//! AMQP consumer implementation for the expander.
//!
//! Consumes one durable queue per assigned vnode over a single channel and
//! acknowledges each delivery once the pipeline reports it handled.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use lapin::{
    acker::Acker,
    message::Delivery,
    options::{
        BasicAckOptions, BasicCancelOptions, BasicConsumeOptions, BasicQosOptions,
        QueueDeclareOptions,
    },
    types::FieldTable,
    Channel, Connection, ConnectionProperties,
};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{debug, error, info, instrument, warn};

use crate::consumer::messages::{InboundMessage, StreamMessage};
use crate::consumer::{vnode_queue_name, Consumer};
use crate::errors::IngestError;
use expander_shared::PartitionAssignment;

/// Broker connection parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmqpSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    pub vhost: String,
}

impl AmqpSettings {
    /// Render an `amqp://` URI. Credentials and vhost are percent-encoded, so
    /// the default vhost `/chef` becomes `%2Fchef`.
    pub fn uri(&self) -> String {
        format!(
            "amqp://{}:{}@{}:{}/{}",
            utf8_percent_encode(&self.user, NON_ALPHANUMERIC),
            utf8_percent_encode(&self.pass, NON_ALPHANUMERIC),
            self.host,
            self.port,
            utf8_percent_encode(&self.vhost, NON_ALPHANUMERIC),
        )
    }
}

type DeliveryStream = BoxStream<'static, (String, Result<Delivery, lapin::Error>)>;

/// AMQP consumer for vnode queues.
pub struct AmqpConsumer {
    // Held so the connection stays open as long as the consumer.
    _connection: Connection,
    channel: Channel,
    consumer_tag_prefix: String,
    subscriptions: Mutex<Vec<(String, lapin::Consumer)>>,
    next_delivery_id: AtomicU64,
}

impl AmqpConsumer {
    /// Connect to the broker.
    ///
    /// # Arguments
    ///
    /// * `settings` - Broker connection parameters
    /// * `prefetch` - Maximum number of unacknowledged deliveries
    /// * `ps_tag` - Free-form tag added to consumer tags
    ///
    /// # Returns
    ///
    /// * `Ok(AmqpConsumer)` - A connected consumer
    /// * `Err(IngestError)` - If connecting or opening the channel fails
    pub async fn connect(
        settings: &AmqpSettings,
        prefetch: u16,
        ps_tag: &str,
    ) -> Result<Self, IngestError> {
        let connection = Connection::connect(&settings.uri(), ConnectionProperties::default())
            .await
            .map_err(|e| IngestError::broker(format!("Failed to connect to AMQP broker: {e}")))?;
        let channel = connection.create_channel().await?;
        channel
            .basic_qos(prefetch, BasicQosOptions::default())
            .await?;

        info!(
            host = %settings.host,
            port = settings.port,
            vhost = %settings.vhost,
            prefetch = prefetch,
            "Connected to AMQP broker"
        );

        let consumer_tag_prefix = if ps_tag.is_empty() {
            "expander".to_string()
        } else {
            format!("expander-{ps_tag}")
        };

        Ok(Self {
            _connection: connection,
            channel,
            consumer_tag_prefix,
            subscriptions: Mutex::new(Vec::new()),
            next_delivery_id: AtomicU64::new(0),
        })
    }

    fn consumer_tag(&self, queue: &str) -> String {
        format!("{}-{}", self.consumer_tag_prefix, queue)
    }

    async fn cancel_subscriptions(&self, queues: &[String]) {
        for queue in queues {
            let tag = self.consumer_tag(queue);
            if let Err(e) = self
                .channel
                .basic_cancel(&tag, BasicCancelOptions::default())
                .await
            {
                warn!(queue = %queue, error = %e, "Failed to cancel AMQP subscription");
            }
        }
    }
}

#[async_trait]
impl Consumer for AmqpConsumer {
    async fn subscribe(&self, assignment: &PartitionAssignment) -> Result<(), IngestError> {
        let mut subscriptions = self.subscriptions.lock().await;

        for vnode in assignment {
            let queue = vnode_queue_name(vnode);
            self.channel
                .queue_declare(
                    &queue,
                    QueueDeclareOptions {
                        durable: true,
                        ..QueueDeclareOptions::default()
                    },
                    FieldTable::default(),
                )
                .await?;

            let subscription = self
                .channel
                .basic_consume(
                    &queue,
                    &self.consumer_tag(&queue),
                    BasicConsumeOptions::default(),
                    FieldTable::default(),
                )
                .await?;

            debug!(queue = %queue, "Subscribed to vnode queue");
            subscriptions.push((queue, subscription));
        }

        info!(
            first_vnode = assignment.start(),
            last_vnode = assignment.end().saturating_sub(1),
            queue_count = subscriptions.len(),
            "Subscribed to vnode queues"
        );
        Ok(())
    }

    #[instrument(skip(self, sender, ack_receiver, shutdown))]
    async fn run(
        &self,
        sender: mpsc::Sender<StreamMessage>,
        mut ack_receiver: mpsc::UnboundedReceiver<StreamMessage>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), IngestError> {
        let subscriptions = std::mem::take(&mut *self.subscriptions.lock().await);
        let queues: Vec<String> = subscriptions.iter().map(|(queue, _)| queue.clone()).collect();

        let mut deliveries = stream::select_all(subscriptions.into_iter().map(
            |(queue, subscription)| -> DeliveryStream {
                subscription
                    .map(move |delivery| (queue.clone(), delivery))
                    .boxed()
            },
        ));

        let mut pending: HashMap<u64, Acker> = HashMap::new();
        let mut draining = false;

        loop {
            tokio::select! {
                _ = shutdown.recv(), if !draining => {
                    info!("Consumer received shutdown signal");
                    draining = true;
                    self.cancel_subscriptions(&queues).await;
                    // The orchestrator may already have stopped reading.
                    let _ = sender.try_send(StreamMessage::End);
                }
                ack_msg = ack_receiver.recv() => {
                    match ack_msg {
                        Some(StreamMessage::Acknowledgment { delivery_id, success }) => {
                            match pending.remove(&delivery_id) {
                                Some(acker) => {
                                    if let Err(e) = acker.ack(BasicAckOptions::default()).await {
                                        error!(delivery_id, error = %e, "Failed to acknowledge delivery");
                                    } else {
                                        debug!(delivery_id, success, "Acknowledged delivery");
                                    }
                                }
                                None => warn!(delivery_id, "Acknowledgment for unknown delivery"),
                            }
                        }
                        Some(_) => {}
                        None => {
                            info!("Acknowledgment channel closed");
                            break;
                        }
                    }
                }
                delivery = deliveries.next(), if !draining => {
                    match delivery {
                        Some((queue, Ok(delivery))) => {
                            let delivery_id = self.next_delivery_id.fetch_add(1, Ordering::Relaxed);
                            debug!(
                                queue = %queue,
                                delivery_id,
                                redelivered = delivery.redelivered,
                                "Received delivery"
                            );
                            pending.insert(delivery_id, delivery.acker);
                            let forwarded = sender
                                .send(StreamMessage::Delivery(InboundMessage {
                                    delivery_id,
                                    queue,
                                    payload: delivery.data,
                                }))
                                .await;
                            if forwarded.is_err() {
                                warn!(delivery_id, "Delivery channel closed; no longer consuming");
                                draining = true;
                                self.cancel_subscriptions(&queues).await;
                            }
                        }
                        Some((queue, Err(e))) => {
                            error!(queue = %queue, error = %e, "AMQP delivery error");
                            let _ = sender.send(StreamMessage::Error(e.to_string())).await;
                        }
                        None => {
                            info!("AMQP delivery streams ended");
                            draining = true;
                            let _ = sender.send(StreamMessage::End).await;
                        }
                    }
                }
            }
        }

        if !pending.is_empty() {
            warn!(
                unacknowledged = pending.len(),
                "Deliveries left unacknowledged; the broker will redeliver them"
            );
        }

        Ok(())
    }
}
