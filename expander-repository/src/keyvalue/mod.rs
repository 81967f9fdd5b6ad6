//! Redis implementation of the key-value store.

mod redis_store;

pub use redis_store::RedisStore;
