//! InMemoryStore - 開発用のストア
//!
//! Implements every store port on top of one map, using Redis semantics:
//! a key holds exactly one kind of value, empty collections disappear, and
//! counters are integer strings.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::StoreError;
use crate::ports::{CounterStore, HashStore, KeyValueStore, QueueStore, SetStore};

#[derive(Debug, Clone)]
enum Entry {
    Str(String),
    List(VecDeque<String>),
    Set(BTreeSet<String>),
    Hash(HashMap<String, String>),
}

/// In-memory store shared by every worker in a process.
///
/// # 使用例
/// ```ignore
/// let store = Arc::new(InMemoryStore::new());
/// let stores = Stores::from_backend(store.clone());
/// store.rpush("resque:queue:mail", payload).await?;
/// ```
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

fn wrong_type(key: &str) -> StoreError {
    StoreError::WrongType {
        key: key.to_string(),
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn exists(&self, key: &str) -> bool {
        self.entries.lock().await.contains_key(key)
    }

    /// Snapshot of a list, head first.
    pub async fn list(&self, key: &str) -> Vec<String> {
        match self.entries.lock().await.get(key) {
            Some(Entry::List(items)) => items.iter().cloned().collect(),
            _ => Vec::new(),
        }
    }

    pub async fn hget(&self, hash: &str, field: &str) -> Option<String> {
        match self.entries.lock().await.get(hash) {
            Some(Entry::Hash(fields)) => fields.get(field).cloned(),
            _ => None,
        }
    }

    /// Counter value, 0 when missing or not an integer.
    pub async fn counter(&self, key: &str) -> i64 {
        match self.entries.lock().await.get(key) {
            Some(Entry::Str(value)) => value.parse().unwrap_or(0),
            _ => 0,
        }
    }
}

#[async_trait]
impl QueueStore for InMemoryStore {
    async fn rpush(&self, list: &str, message: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        match entries
            .entry(list.to_string())
            .or_insert_with(|| Entry::List(VecDeque::new()))
        {
            Entry::List(items) => {
                items.push_back(message.to_string());
                Ok(())
            }
            _ => Err(wrong_type(list)),
        }
    }

    async fn lpop(&self, list: &str) -> Result<Option<String>, StoreError> {
        let mut entries = self.entries.lock().await;
        let (popped, now_empty) = match entries.get_mut(list) {
            None => return Ok(None),
            Some(Entry::List(items)) => {
                let popped = items.pop_front();
                (popped, items.is_empty())
            }
            Some(_) => return Err(wrong_type(list)),
        };
        if now_empty {
            entries.remove(list);
        }
        Ok(popped)
    }
}

#[async_trait]
impl SetStore for InMemoryStore {
    async fn sadd(&self, set: &str, member: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        match entries
            .entry(set.to_string())
            .or_insert_with(|| Entry::Set(BTreeSet::new()))
        {
            Entry::Set(members) => {
                members.insert(member.to_string());
                Ok(())
            }
            _ => Err(wrong_type(set)),
        }
    }

    async fn srem(&self, set: &str, member: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        let now_empty = match entries.get_mut(set) {
            None => return Ok(()),
            Some(Entry::Set(members)) => {
                members.remove(member);
                members.is_empty()
            }
            Some(_) => return Err(wrong_type(set)),
        };
        if now_empty {
            entries.remove(set);
        }
        Ok(())
    }

    async fn smembers(&self, set: &str) -> Result<Vec<String>, StoreError> {
        match self.entries.lock().await.get(set) {
            None => Ok(Vec::new()),
            Some(Entry::Set(members)) => Ok(members.iter().cloned().collect()),
            Some(_) => Err(wrong_type(set)),
        }
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.entries.lock().await.get(key) {
            None => Ok(None),
            Some(Entry::Str(value)) => Ok(Some(value.clone())),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), Entry::Str(value.to_string()));
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<i64, StoreError> {
        let removed = self.entries.lock().await.remove(key);
        Ok(i64::from(removed.is_some()))
    }
}

#[async_trait]
impl CounterStore for InMemoryStore {
    async fn incr_by(&self, key: &str, by: i64) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::Str("0".to_string()));
        match entry {
            Entry::Str(value) => {
                let current: i64 = value.parse().map_err(|_| wrong_type(key))?;
                *value = (current + by).to_string();
                Ok(())
            }
            _ => Err(wrong_type(key)),
        }
    }
}

#[async_trait]
impl HashStore for InMemoryStore {
    async fn hset(&self, hash: &str, field: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        match entries
            .entry(hash.to_string())
            .or_insert_with(|| Entry::Hash(HashMap::new()))
        {
            Entry::Hash(fields) => {
                fields.insert(field.to_string(), value.to_string());
                Ok(())
            }
            _ => Err(wrong_type(hash)),
        }
    }

    async fn hdel(&self, hash: &str, field: &str) -> Result<i64, StoreError> {
        let mut entries = self.entries.lock().await;
        let (removed, now_empty) = match entries.get_mut(hash) {
            None => return Ok(0),
            Some(Entry::Hash(fields)) => {
                let removed = fields.remove(field).is_some();
                (removed, fields.is_empty())
            }
            Some(_) => return Err(wrong_type(hash)),
        };
        if now_empty {
            entries.remove(hash);
        }
        Ok(i64::from(removed))
    }
}
