//! Key-value store trait definition.

use async_trait::async_trait;

use crate::errors::KeyValueError;

/// A store of string sets addressed by string keys.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Add `member` to the set stored under `key`, creating the set if needed.
    async fn set_add(&self, key: &str, member: &str) -> Result<(), KeyValueError>;
}
