//! In-process [`Store`] with the observable behavior of Redis for the
//! primitives the relationship layer uses.
//!
//! Expired keys are purged lazily when they are next touched. Lists, sorted
//! sets and sets disappear once their last element is removed.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::{StoreError, StoreResult};
use crate::sorted_set::SortedSet;
use crate::store::{ScoreBound, ScoredMember, Store};

#[derive(Debug, Clone, PartialEq)]
pub enum DataType {
    String(String),
    List(VecDeque<String>),
    SortedSet(SortedSet),
    Set(HashSet<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    pub data: DataType,
    pub expiration: Option<Instant>,
}

impl Value {
    fn persistent(data: DataType) -> Self {
        Self {
            data,
            expiration: None,
        }
    }

    fn is_expired(&self) -> bool {
        self.expiration
            .is_some_and(|expiration| Instant::now() > expiration)
    }
}

pub type KeyValueStore = HashMap<String, Value>;

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<KeyValueStore>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remaining time to live of `key`, if it exists and has one.
    pub async fn time_to_live(&self, key: &str) -> Option<Duration> {
        let mut entries = self.entries.lock().await;
        purge_if_expired(&mut entries, key);

        let expiration = entries.get(key)?.expiration?;
        Some(expiration.saturating_duration_since(Instant::now()))
    }

    /// A copy of what is stored at `key`, ignoring expired entries.
    pub async fn snapshot(&self, key: &str) -> Option<Value> {
        let mut entries = self.entries.lock().await;
        purge_if_expired(&mut entries, key);

        entries.get(key).cloned()
    }
}

fn purge_if_expired(entries: &mut KeyValueStore, key: &str) {
    if entries.get(key).is_some_and(Value::is_expired) {
        entries.remove(key);
    }
}

fn wrong_type() -> StoreError {
    StoreError::Rejected(
        "WRONGTYPE Operation against a key holding the wrong kind of value".to_string(),
    )
}

fn not_an_integer() -> StoreError {
    StoreError::Rejected("ERR value is not an integer or out of range".to_string())
}

fn sorted_set<'a>(entries: &'a KeyValueStore, key: &str) -> StoreResult<Option<&'a SortedSet>> {
    match entries.get(key) {
        Some(Value {
            data: DataType::SortedSet(set),
            ..
        }) => Ok(Some(set)),
        Some(_) => Err(wrong_type()),
        None => Ok(None),
    }
}

fn sorted_set_mut<'a>(entries: &'a mut KeyValueStore, key: &str) -> StoreResult<&'a mut SortedSet> {
    let value = entries
        .entry(key.to_string())
        .or_insert_with(|| Value::persistent(DataType::SortedSet(SortedSet::new())));

    match value.data {
        DataType::SortedSet(ref mut set) => Ok(set),
        _ => Err(wrong_type()),
    }
}

fn zadd_locked(entries: &mut KeyValueStore, key: &str, member: &str, score: f64) -> StoreResult<()> {
    if score.is_nan() {
        return Err(StoreError::Rejected("ERR value is not a valid float".to_string()));
    }

    purge_if_expired(entries, key);
    sorted_set_mut(entries, key)?.insert(member, score);

    Ok(())
}

fn range_by_rank(
    entries: &mut KeyValueStore,
    key: &str,
    start: i64,
    stop: i64,
    reverse: bool,
) -> StoreResult<Vec<ScoredMember>> {
    purge_if_expired(entries, key);

    Ok(sorted_set(entries, key)?
        .map(|set| set.range_by_rank(start, stop, reverse))
        .unwrap_or_default())
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut entries = self.entries.lock().await;
        purge_if_expired(&mut entries, key);

        match entries.get(key) {
            Some(Value {
                data: DataType::String(s),
                ..
            }) => Ok(Some(s.clone())),
            Some(_) => Err(wrong_type()),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            Value::persistent(DataType::String(value.to_string())),
        );

        Ok(())
    }

    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            Value {
                data: DataType::String(value.to_string()),
                expiration: Some(Instant::now() + ttl),
            },
        );

        Ok(())
    }

    async fn del(&self, key: &str) -> StoreResult<bool> {
        let mut entries = self.entries.lock().await;
        purge_if_expired(&mut entries, key);

        Ok(entries.remove(key).is_some())
    }

    async fn rename(&self, key: &str, new_key: &str) -> StoreResult<()> {
        let mut entries = self.entries.lock().await;
        purge_if_expired(&mut entries, key);

        let Some(value) = entries.remove(key) else {
            return Err(StoreError::Rejected("ERR no such key".to_string()));
        };
        entries.insert(new_key.to_string(), value);

        Ok(())
    }

    async fn incr(&self, key: &str) -> StoreResult<i64> {
        let mut entries = self.entries.lock().await;
        purge_if_expired(&mut entries, key);

        let Some(value) = entries.get_mut(key) else {
            entries.insert(
                key.to_string(),
                Value::persistent(DataType::String("1".to_string())),
            );
            return Ok(1);
        };

        match value.data {
            DataType::String(ref mut stored_data) => {
                let int = stored_data
                    .parse::<i64>()
                    .map_err(|_| not_an_integer())?;
                let incremented_int = int.checked_add(1).ok_or_else(not_an_integer)?;
                *stored_data = incremented_int.to_string();

                Ok(incremented_int)
            }
            _ => Err(wrong_type()),
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        let mut entries = self.entries.lock().await;
        purge_if_expired(&mut entries, key);

        match entries.get_mut(key) {
            Some(value) => {
                value.expiration = Some(Instant::now() + ttl);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> StoreResult<()> {
        let mut entries = self.entries.lock().await;
        zadd_locked(&mut entries, key, member, score)
    }

    async fn zadd_with_expiry(
        &self,
        key: &str,
        member: &str,
        score: f64,
        ttl: Duration,
    ) -> StoreResult<()> {
        let mut entries = self.entries.lock().await;
        zadd_locked(&mut entries, key, member, score)?;

        if let Some(value) = entries.get_mut(key) {
            value.expiration = Some(Instant::now() + ttl);
        }

        Ok(())
    }

    async fn zscore(&self, key: &str, member: &str) -> StoreResult<Option<f64>> {
        let mut entries = self.entries.lock().await;
        purge_if_expired(&mut entries, key);

        Ok(sorted_set(&entries, key)?.and_then(|set| set.score(member)))
    }

    async fn zincrby(&self, key: &str, member: &str, delta: f64) -> StoreResult<f64> {
        let mut entries = self.entries.lock().await;
        purge_if_expired(&mut entries, key);

        let set = sorted_set_mut(&mut entries, key)?;
        let score = set.increment(member, delta);
        let now_empty = set.is_empty();

        if now_empty {
            entries.remove(key);
        }

        score.ok_or_else(|| {
            StoreError::Rejected("ERR resulting score is not a number (NaN)".to_string())
        })
    }

    async fn zcount(&self, key: &str, min: ScoreBound, max: ScoreBound) -> StoreResult<u64> {
        let mut entries = self.entries.lock().await;
        purge_if_expired(&mut entries, key);

        Ok(sorted_set(&entries, key)?
            .map(|set| set.count(min, max) as u64)
            .unwrap_or(0))
    }

    async fn zrange_by_score(
        &self,
        key: &str,
        min: ScoreBound,
        max: ScoreBound,
        offset: u64,
        count: u64,
    ) -> StoreResult<Vec<ScoredMember>> {
        let mut entries = self.entries.lock().await;
        purge_if_expired(&mut entries, key);

        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        let count = usize::try_from(count).unwrap_or(usize::MAX);

        Ok(sorted_set(&entries, key)?
            .map(|set| set.range_by_score(min, max, offset, count))
            .unwrap_or_default())
    }

    async fn zrange_with_scores(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> StoreResult<Vec<ScoredMember>> {
        let mut entries = self.entries.lock().await;
        range_by_rank(&mut entries, key, start, stop, false)
    }

    async fn zrevrange_with_scores(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> StoreResult<Vec<ScoredMember>> {
        let mut entries = self.entries.lock().await;
        range_by_rank(&mut entries, key, start, stop, true)
    }

    async fn lpush(&self, key: &str, value: &str) -> StoreResult<u64> {
        let mut entries = self.entries.lock().await;
        purge_if_expired(&mut entries, key);

        let stored = entries
            .entry(key.to_string())
            .or_insert_with(|| Value::persistent(DataType::List(VecDeque::new())));

        match stored.data {
            DataType::List(ref mut list) => {
                list.push_front(value.to_string());
                Ok(list.len() as u64)
            }
            _ => Err(wrong_type()),
        }
    }

    async fn rpop(&self, key: &str) -> StoreResult<Option<String>> {
        let mut entries = self.entries.lock().await;
        purge_if_expired(&mut entries, key);

        let Some(stored) = entries.get_mut(key) else {
            return Ok(None);
        };

        let DataType::List(ref mut list) = stored.data else {
            return Err(wrong_type());
        };

        let popped = list.pop_back();
        if list.is_empty() {
            entries.remove(key);
        }

        Ok(popped)
    }

    async fn llen(&self, key: &str) -> StoreResult<u64> {
        let mut entries = self.entries.lock().await;
        purge_if_expired(&mut entries, key);

        match entries.get(key) {
            Some(Value {
                data: DataType::List(list),
                ..
            }) => Ok(list.len() as u64),
            Some(_) => Err(wrong_type()),
            None => Ok(0),
        }
    }

    async fn sadd(&self, key: &str, member: &str) -> StoreResult<bool> {
        let mut entries = self.entries.lock().await;
        purge_if_expired(&mut entries, key);

        let stored = entries
            .entry(key.to_string())
            .or_insert_with(|| Value::persistent(DataType::Set(HashSet::new())));

        match stored.data {
            DataType::Set(ref mut set) => Ok(set.insert(member.to_string())),
            _ => Err(wrong_type()),
        }
    }

    async fn srem(&self, key: &str, member: &str) -> StoreResult<bool> {
        let mut entries = self.entries.lock().await;
        purge_if_expired(&mut entries, key);

        let Some(stored) = entries.get_mut(key) else {
            return Ok(false);
        };

        let DataType::Set(ref mut set) = stored.data else {
            return Err(wrong_type());
        };

        let removed = set.remove(member);
        if set.is_empty() {
            entries.remove(key);
        }

        Ok(removed)
    }

    async fn smembers(&self, key: &str) -> StoreResult<HashSet<String>> {
        let mut entries = self.entries.lock().await;
        purge_if_expired(&mut entries, key);

        match entries.get(key) {
            Some(Value {
                data: DataType::Set(set),
                ..
            }) => Ok(set.clone()),
            Some(_) => Err(wrong_type()),
            None => Ok(HashSet::new()),
        }
    }
}
