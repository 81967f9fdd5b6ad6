//! Orchestrator module for the expander pipeline.
//!
//! Coordinates the consumer and the dispatcher: every delivery is dispatched
//! on its own task, and its acknowledgement travels back to the consumer once
//! the dispatcher completes it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;
use tokio::time::{interval, Duration, Instant, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

use expander_shared::PartitionAssignment;

use crate::consumer::{Completion, Consumer, InboundMessage, StreamMessage};
use crate::errors::IngestError;
use crate::processor::{DispatchOutcome, Dispatcher};

/// Configuration for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Size of the delivery channel buffer.
    pub channel_buffer_size: usize,
    /// How often pipeline progress is logged.
    pub progress_interval: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            channel_buffer_size: 1000,
            progress_interval: Duration::from_secs(10),
        }
    }
}

/// Counters shared between the orchestrator and its dispatch tasks.
#[derive(Debug, Default)]
pub struct PipelineStats {
    received: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

impl PipelineStats {
    /// Deliveries handed to a dispatch task.
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    /// Deliveries whose dispatch finished, successfully or not.
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Deliveries whose dispatch failed.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    fn record(&self, outcome: DispatchOutcome) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        if !outcome.is_success() {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Orchestrator that coordinates the pipeline components.
///
/// The orchestrator:
/// - Subscribes the consumer to this node's vnode queues
/// - Dispatches deliveries concurrently
/// - Routes acknowledgements back to the consumer
/// - Handles shutdown signals, letting in-flight deliveries finish
pub struct Orchestrator {
    consumer: Arc<dyn Consumer>,
    dispatcher: Arc<Dispatcher>,
    assignment: PartitionAssignment,
    config: OrchestratorConfig,
    shutdown_tx: broadcast::Sender<()>,
    stats: Arc<PipelineStats>,
}

impl Orchestrator {
    /// Create a new orchestrator with the given components.
    pub fn new(
        consumer: Arc<dyn Consumer>,
        dispatcher: Dispatcher,
        assignment: PartitionAssignment,
    ) -> Self {
        Self::with_config(consumer, dispatcher, assignment, OrchestratorConfig::default())
    }

    /// Create a new orchestrator with custom configuration.
    pub fn with_config(
        consumer: Arc<dyn Consumer>,
        dispatcher: Dispatcher,
        assignment: PartitionAssignment,
        config: OrchestratorConfig,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            consumer,
            dispatcher: Arc::new(dispatcher),
            assignment,
            config,
            shutdown_tx,
            stats: Arc::new(PipelineStats::default()),
        }
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    /// Run the orchestrator.
    ///
    /// Returns once the consumer's stream ends or a shutdown is requested,
    /// after every in-flight delivery has been completed and acknowledged.
    #[instrument(skip(self), fields(first_vnode = self.assignment.start(), vnode_count = self.assignment.len()))]
    pub async fn run(&self) -> Result<(), IngestError> {
        info!("Starting expander orchestrator");

        self.consumer.subscribe(&self.assignment).await?;

        let (event_transmitter, mut event_receiver) =
            mpsc::channel::<StreamMessage>(self.config.channel_buffer_size);
        let (ack_transmitter, ack_receiver) = mpsc::unbounded_channel::<StreamMessage>();

        let mut shutdown_listener = self.shutdown_tx.subscribe();
        let consumer = self.consumer.clone();
        let consumer_shutdown = self.shutdown_tx.subscribe();
        let consumer_handle = tokio::spawn(async move {
            if let Err(e) = consumer
                .run(event_transmitter, ack_receiver, consumer_shutdown)
                .await
            {
                error!(error = %e, "Consumer error");
            }
        });

        info!("Ready to process deliveries");

        let mut in_flight = JoinSet::new();
        let mut progress_timer = interval(self.config.progress_interval);
        progress_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut prev_completed: u64 = 0;
        let mut prev_time = Instant::now();

        loop {
            tokio::select! {
                msg = event_receiver.recv() => {
                    match msg {
                        Some(StreamMessage::Delivery(message)) => {
                            self.spawn_dispatch(&mut in_flight, message, &ack_transmitter);
                        }
                        Some(StreamMessage::Error(e)) => {
                            error!(error = %e, "Received error from consumer");
                        }
                        Some(StreamMessage::End) | None => {
                            info!("Consumer stream ended");
                            break;
                        }
                        Some(StreamMessage::Acknowledgment { .. }) => {
                            warn!("Received acknowledgment on delivery channel (should be on ack channel)");
                        }
                    }
                }
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "Dispatch task failed");
                    }
                }
                _ = shutdown_listener.recv() => {
                    info!("Shutdown requested");
                    break;
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    let _ = self.shutdown_tx.send(());
                    break;
                }
                _ = progress_timer.tick() => {
                    let completed = self.stats.completed();
                    let now = Instant::now();
                    let elapsed_secs = now.duration_since(prev_time).as_secs_f64();
                    let messages_per_sec = if elapsed_secs > 0.0 {
                        (completed.saturating_sub(prev_completed) as f64) / elapsed_secs
                    } else {
                        0.0
                    };

                    info!(
                        messages_received = self.stats.received(),
                        messages_completed = completed,
                        messages_failed = self.stats.failed(),
                        in_flight = in_flight.len(),
                        messages_per_sec = format!("{:.2}", messages_per_sec),
                        "Processing progress"
                    );

                    prev_completed = completed;
                    prev_time = now;
                }
            }
        }

        // Deliveries the consumer has not handed over yet stay unacknowledged
        // and are redelivered by the broker.
        drop(event_receiver);

        if !in_flight.is_empty() {
            info!(in_flight = in_flight.len(), "Waiting for in-flight deliveries");
        }
        while let Some(joined) = in_flight.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Dispatch task failed");
            }
        }

        // Closing the ack channel lets the consumer finish.
        drop(ack_transmitter);
        let _ = consumer_handle.await;

        info!(
            messages_received = self.stats.received(),
            messages_completed = self.stats.completed(),
            messages_failed = self.stats.failed(),
            "Orchestrator shutdown complete"
        );
        Ok(())
    }

    fn spawn_dispatch(
        &self,
        in_flight: &mut JoinSet<()>,
        message: InboundMessage,
        ack_transmitter: &mpsc::UnboundedSender<StreamMessage>,
    ) {
        self.stats.received.fetch_add(1, Ordering::Relaxed);
        debug!(
            delivery_id = message.delivery_id,
            queue = %message.queue,
            "Dispatching delivery"
        );

        let dispatcher = self.dispatcher.clone();
        let stats = self.stats.clone();
        let completion = Completion::new(message.delivery_id, ack_transmitter.clone());

        in_flight.spawn(async move {
            let outcome = dispatcher.handle(&message.payload, completion).await;
            stats.record(outcome);
        });
    }

    /// Trigger a graceful shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}
