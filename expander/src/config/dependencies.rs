//! Dependency initialization and wiring for the expander.

use std::fmt::Display;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use expander_repository::{RedisStore, SolrProvider};

use crate::config::Config;
use crate::consumer::AmqpConsumer;
use crate::loader::{KeyValueSink, SearchSink};
use crate::orchestrator::Orchestrator;
use crate::processor::Dispatcher;
use crate::IndexingError;

/// Connection mode for the broker and Redis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Fail immediately if connection fails.
    FailFast,
    /// Retry connection every retry interval until successful.
    Retry,
}

impl FromStr for ConnectionMode {
    type Err = String;

    /// Valid values: "fail-fast" or "retry" (case-insensitive)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fail-fast" | "failfast" | "fail_fast" => Ok(Self::FailFast),
            "retry" => Ok(Self::Retry),
            other => Err(format!(
                "unknown connection mode '{other}' (expected retry or fail-fast)"
            )),
        }
    }
}

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// The configured orchestrator ready to run.
    pub orchestrator: Orchestrator,
}

impl Dependencies {
    /// Initialize all dependencies from a validated configuration.
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(IndexingError)` - If initialization fails (only in fail-fast mode
    ///   for connection failures)
    pub async fn new(config: &Config) -> Result<Self, IndexingError> {
        let assignment = config.assignment();

        info!(
            index = config.topology.ordinal(),
            node_count = config.topology.cluster_size(),
            first_vnode = assignment.start(),
            last_vnode = assignment.end().saturating_sub(1),
            sinks = %config.sinks,
            solr_url = %config.solr.url,
            amqp_host = %config.amqp.host,
            amqp_port = config.amqp.port,
            amqp_vhost = %config.amqp.vhost,
            connection_mode = ?config.connection_mode,
            retry_interval_secs = config.connection_retry_interval.as_secs(),
            "Initializing dependencies"
        );

        let search = if config.sinks.solr {
            let provider = SolrProvider::new(&config.solr).map_err(|e| {
                IndexingError::connection("Solr", format!("Failed to create Solr provider: {e}"))
            })?;
            Some(SearchSink::new(Arc::new(provider)))
        } else {
            None
        };

        let key_value = if config.sinks.redis {
            let store = connect_with_retry("Redis", config, || RedisStore::connect(&config.redis))
                .await?;
            info!("Redis connection established");
            Some(KeyValueSink::new(Arc::new(store)))
        } else {
            None
        };

        let consumer = connect_with_retry("AMQP broker", config, || {
            AmqpConsumer::connect(&config.amqp, config.amqp_prefetch, &config.ps_tag)
        })
        .await?;

        info!("AMQP consumer created");

        let dispatcher = Dispatcher::new(search, key_value);
        let orchestrator = Orchestrator::new(Arc::new(consumer), dispatcher, assignment);

        Ok(Self { orchestrator })
    }
}

/// Connect to a service with retry logic based on connection mode.
async fn connect_with_retry<T, E, F, Fut>(
    service: &'static str,
    config: &Config,
    mut connect: F,
) -> Result<T, IndexingError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    connect_with_policy(
        service,
        config.connection_mode,
        config.connection_retry_interval,
        &mut connect,
    )
    .await
}

async fn connect_with_policy<T, E, F, Fut>(
    service: &'static str,
    mode: ConnectionMode,
    retry_interval: Duration,
    connect: &mut F,
) -> Result<T, IndexingError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    loop {
        match connect().await {
            Ok(connection) => return Ok(connection),
            Err(e) => match mode {
                ConnectionMode::FailFast => {
                    return Err(IndexingError::connection(service, e.to_string()));
                }
                ConnectionMode::Retry => {
                    warn!(
                        service = service,
                        error = %e,
                        retry_interval_secs = retry_interval.as_secs(),
                        "Failed to connect to {service}, retrying..."
                    );
                    sleep(retry_interval).await;
                }
            },
        }
    }
}
