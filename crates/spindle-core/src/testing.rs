//! Test helpers: a store wrapper that counts calls and injects failures.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use crate::domain::StoreError;
use crate::impls::InMemoryStore;
use crate::ports::{
    CounterStore, FixedClock, HashStore, KeyValueStore, QueueStore, SetStore, Stores,
};

pub(crate) fn fixed_clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2024, 3, 1, 1, 20, 0).unwrap(),
    ))
}

#[derive(Default)]
struct Faults {
    failing: HashSet<&'static str>,
    calls: HashMap<&'static str, usize>,
    log: Vec<(&'static str, String)>,
}

/// Wraps `InMemoryStore`; operations named in `fail` return a transport error.
#[derive(Clone, Default)]
pub(crate) struct FaultyStore {
    pub inner: InMemoryStore,
    faults: Arc<Mutex<Faults>>,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stores(&self) -> Stores {
        Stores::from_backend(Arc::new(self.clone()))
    }

    pub fn fail(&self, op: &'static str) {
        self.faults.lock().unwrap().failing.insert(op);
    }

    pub fn heal(&self, op: &'static str) {
        self.faults.lock().unwrap().failing.remove(op);
    }

    pub fn calls(&self, op: &'static str) -> usize {
        self.faults.lock().unwrap().calls.get(op).copied().unwrap_or(0)
    }

    /// Keys passed to `op`, in call order.
    pub fn keys_for(&self, op: &'static str) -> Vec<String> {
        self.faults
            .lock()
            .unwrap()
            .log
            .iter()
            .filter(|(o, _)| *o == op)
            .map(|(_, key)| key.clone())
            .collect()
    }

    fn enter(&self, op: &'static str, key: &str) -> Result<(), StoreError> {
        let mut faults = self.faults.lock().unwrap();
        *faults.calls.entry(op).or_default() += 1;
        faults.log.push((op, key.to_string()));
        if faults.failing.contains(op) {
            return Err(StoreError::transport(op, "injected failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl QueueStore for FaultyStore {
    async fn rpush(&self, list: &str, message: &str) -> Result<(), StoreError> {
        self.enter("rpush", list)?;
        self.inner.rpush(list, message).await
    }

    async fn lpop(&self, list: &str) -> Result<Option<String>, StoreError> {
        self.enter("lpop", list)?;
        self.inner.lpop(list).await
    }
}

#[async_trait]
impl SetStore for FaultyStore {
    async fn sadd(&self, set: &str, member: &str) -> Result<(), StoreError> {
        self.enter("sadd", set)?;
        self.inner.sadd(set, member).await
    }

    async fn srem(&self, set: &str, member: &str) -> Result<(), StoreError> {
        self.enter("srem", set)?;
        self.inner.srem(set, member).await
    }

    async fn smembers(&self, set: &str) -> Result<Vec<String>, StoreError> {
        self.enter("smembers", set)?;
        self.inner.smembers(set).await
    }
}

#[async_trait]
impl KeyValueStore for FaultyStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.enter("get", key)?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.enter("set", key)?;
        self.inner.set(key, value).await
    }

    async fn del(&self, key: &str) -> Result<i64, StoreError> {
        self.enter("del", key)?;
        self.inner.del(key).await
    }
}

#[async_trait]
impl CounterStore for FaultyStore {
    async fn incr_by(&self, key: &str, by: i64) -> Result<(), StoreError> {
        self.enter("incr_by", key)?;
        self.inner.incr_by(key, by).await
    }
}

#[async_trait]
impl HashStore for FaultyStore {
    async fn hset(&self, hash: &str, field: &str, value: &str) -> Result<(), StoreError> {
        self.enter("hset", hash)?;
        self.inner.hset(hash, field, value).await
    }

    async fn hdel(&self, hash: &str, field: &str) -> Result<i64, StoreError> {
        self.enter("hdel", hash)?;
        self.inner.hdel(hash, field).await
    }
}
