//! Store ports - the only operations the worker runtime needs from storage.
//!
//! Each capability is its own trait so tests can fake one without the others.
//! The Resque layout maps them onto Redis lists, sets, strings, counters and
//! hashes, but nothing here depends on Redis.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::StoreError;

/// List semantics: push to the tail, pop from the head.
#[async_trait]
pub trait QueueStore: Send + Sync {
    async fn rpush(&self, list: &str, message: &str) -> Result<(), StoreError>;

    /// `Ok(None)` when the list is empty or missing.
    async fn lpop(&self, list: &str) -> Result<Option<String>, StoreError>;
}

#[async_trait]
pub trait SetStore: Send + Sync {
    async fn sadd(&self, set: &str, member: &str) -> Result<(), StoreError>;
    async fn srem(&self, set: &str, member: &str) -> Result<(), StoreError>;
    async fn smembers(&self, set: &str) -> Result<Vec<String>, StoreError>;
}

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// `Ok(None)` when the key does not exist.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Set without expiry.
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Returns the number of keys removed.
    async fn del(&self, key: &str) -> Result<i64, StoreError>;
}

#[async_trait]
pub trait CounterStore: Send + Sync {
    async fn incr_by(&self, key: &str, by: i64) -> Result<(), StoreError>;
}

/// Field-keyed hash, used for the liveness registry.
#[async_trait]
pub trait HashStore: Send + Sync {
    async fn hset(&self, hash: &str, field: &str, value: &str) -> Result<(), StoreError>;

    /// Returns the number of fields removed.
    async fn hdel(&self, hash: &str, field: &str) -> Result<i64, StoreError>;
}

/// Shared handles to every capability, cloned into each worker.
#[derive(Clone)]
pub struct Stores {
    pub queue: Arc<dyn QueueStore>,
    pub set: Arc<dyn SetStore>,
    pub kv: Arc<dyn KeyValueStore>,
    pub counter: Arc<dyn CounterStore>,
    pub hash: Arc<dyn HashStore>,
}

impl Stores {
    /// Use one backend for every capability.
    pub fn from_backend<S>(store: Arc<S>) -> Self
    where
        S: QueueStore + SetStore + KeyValueStore + CounterStore + HashStore + 'static,
    {
        Self {
            queue: store.clone(),
            set: store.clone(),
            kv: store.clone(),
            counter: store.clone(),
            hash: store,
        }
    }
}
