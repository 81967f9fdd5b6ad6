//! Redis key-value store implementation.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tracing::{debug, info};

use crate::config::RedisConfig;
use crate::errors::KeyValueError;
use crate::interfaces::KeyValueStore;

/// Redis-backed set store.
///
/// Holds one multiplexed connection; clones of it pipeline commands over the
/// same socket, so concurrent messages share it without locking.
pub struct RedisStore {
    connection: MultiplexedConnection,
}

impl RedisStore {
    /// Connect to the Redis server at `config.url`.
    ///
    /// # Returns
    ///
    /// * `Ok(RedisStore)` - A connected store
    /// * `Err(KeyValueError)` - If the URL is invalid or the server is unreachable
    pub async fn connect(config: &RedisConfig) -> Result<Self, KeyValueError> {
        let client = redis::Client::open(config.url.as_str())
            .map_err(|e| KeyValueError::connection(format!("Invalid Redis URL: {e}")))?;
        let connection = client.get_multiplexed_async_connection().await?;

        info!(url = %config.url, "Connected to Redis");

        Ok(Self { connection })
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn set_add(&self, key: &str, member: &str) -> Result<(), KeyValueError> {
        let mut connection = self.connection.clone();
        let added: i64 = connection.sadd(key, member).await?;
        debug!(key = %key.escape_debug(), member = %member, added, "SADD");
        Ok(())
    }
}
