//! Domain operations over a [`Store`]: counters, time-windowed relationship
//! scores, FIFO queues, member sets and plain string values.
//!
//! The façade keeps no state besides the store handle. Every operation is a
//! single request to the store; nothing is cached or retried, and a missing
//! key or member reads as `None`, an empty collection, or zero.

use std::collections::HashSet;
use std::time::Duration;

use crate::redis_store::RedisStore;
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::store::{ScoreBound, ScoredMember, Store};

#[derive(Debug, Clone)]
pub struct RelationshipStore<S> {
    store: S,
}

impl RelationshipStore<RedisStore> {
    /// Connects to a Redis-compatible server and wraps the connection.
    pub async fn connect(config: StoreConfig) -> StoreResult<Self> {
        Ok(Self::new(RedisStore::connect(config).await?))
    }

    /// Connects using a `redis://[[username]:password@]host[:port][/db]` URL.
    pub async fn connect_url(url: &str) -> StoreResult<Self> {
        Self::connect(StoreConfig::from_url(url)?).await
    }
}

impl<S: Store> RelationshipStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Renames `key` to `new_key`, replacing whatever `new_key` held.
    ///
    /// Fails with [`StoreError::Rejected`] if `key` does not exist.
    pub async fn rename(&self, key: &str, new_key: &str) -> StoreResult<()> {
        self.store.rename(key, new_key).await
    }

    /// Removes `key` whatever structure it holds. A missing key is a no-op.
    pub async fn delete(&self, key: &str) -> StoreResult<()> {
        self.store.del(key).await.map(|_| ())
    }

    /// Reads the counter at `key`.
    ///
    /// Returns `Ok(None)` when the key is absent, which is distinct from a
    /// stored zero, and [`StoreError::MalformedValue`] when the stored value
    /// is not a 64-bit integer.
    pub async fn read_counter(&self, key: &str) -> StoreResult<Option<i64>> {
        let Some(raw) = self.store.get(key).await? else {
            return Ok(None);
        };

        raw.parse::<i64>()
            .map(Some)
            .map_err(|_| StoreError::MalformedValue {
                key: key.to_string(),
                value: raw,
            })
    }

    /// Reads the counter at `key`, substituting `default` only when the key
    /// is absent.
    pub async fn read_counter_or(&self, key: &str, default: i64) -> StoreResult<i64> {
        Ok(self.read_counter(key).await?.unwrap_or(default))
    }

    /// Atomically adds one to the counter, creating it at zero first.
    pub async fn increment(&self, key: &str) -> StoreResult<i64> {
        self.store.incr(key).await
    }

    /// Sets the score of `member`, overwriting any previous score.
    pub async fn add_score(&self, key: &str, member: &str, score: f64) -> StoreResult<()> {
        check_score("score", score)?;
        self.store.zadd(key, member, score).await
    }

    /// Sets the score of `member` and the TTL of the whole sorted set.
    ///
    /// Both shipped backends apply the two together. A backend relying on the
    /// default [`Store::zadd_with_expiry`] may report
    /// [`StoreError::PartialCompositeFailure`] when only the score was
    /// written; calling [`RelationshipStore::expire`] again is then enough.
    pub async fn add_score_with_expiry(
        &self,
        key: &str,
        member: &str,
        score: f64,
        ttl: Duration,
    ) -> StoreResult<()> {
        check_score("score", score)?;
        check_ttl(ttl)?;
        self.store.zadd_with_expiry(key, member, score, ttl).await
    }

    /// Counts members scored within the inclusive window between
    /// `historical_time` and `current_time`.
    ///
    /// Callers pass the older bound as `historical_time`, but the window is
    /// the same if the two are swapped. Missing keys count zero.
    pub async fn count_in_range(
        &self,
        key: &str,
        current_time: f64,
        historical_time: f64,
    ) -> StoreResult<u64> {
        let (min, max) = window(current_time, historical_time)?;
        self.store
            .zcount(key, ScoreBound::Inclusive(min), ScoreBound::Inclusive(max))
            .await
    }

    /// Lists one page of members scored within the inclusive window, in
    /// ascending score order.
    pub async fn range_by_score(
        &self,
        key: &str,
        current_time: f64,
        historical_time: f64,
        offset: u64,
        count: u64,
    ) -> StoreResult<Vec<ScoredMember>> {
        let (min, max) = window(current_time, historical_time)?;
        self.store
            .zrange_by_score(
                key,
                ScoreBound::Inclusive(min),
                ScoreBound::Inclusive(max),
                offset,
                count,
            )
            .await
    }

    /// Like [`RelationshipStore::range_by_score`] with explicit bounds, which
    /// may be exclusive or open-ended.
    pub async fn range_by_score_bounds(
        &self,
        key: &str,
        min: ScoreBound,
        max: ScoreBound,
        offset: u64,
        count: u64,
    ) -> StoreResult<Vec<ScoredMember>> {
        if min.is_nan() || max.is_nan() {
            return Err(StoreError::InvalidArgument(
                "score bounds must not be NaN".to_string(),
            ));
        }

        self.store
            .zrange_by_score(key, min, max, offset, count)
            .await
    }

    /// Adds `delta` to the score of `member`, creating it at `delta`.
    /// Returns the new score.
    pub async fn increment_score(&self, key: &str, member: &str, delta: f64) -> StoreResult<f64> {
        check_score("delta", delta)?;
        self.store.zincrby(key, member, delta).await
    }

    pub async fn get_score(&self, key: &str, member: &str) -> StoreResult<Option<f64>> {
        self.store.zscore(key, member).await
    }

    /// The member with the lowest score at or above `min_score`. Equal scores
    /// resolve to the lexicographically smallest member.
    pub async fn first_at_or_after(&self, key: &str, min_score: f64) -> StoreResult<Option<String>> {
        check_score("minimum score", min_score)?;

        let first = self
            .store
            .zrange_by_score(
                key,
                ScoreBound::Inclusive(min_score),
                ScoreBound::PosInfinity,
                0,
                1,
            )
            .await?;

        Ok(first.into_iter().next().map(|entry| entry.member))
    }

    /// Members ranked `start..=end` in ascending score order. Negative ranks
    /// count from the highest score.
    pub async fn range_with_scores(
        &self,
        key: &str,
        start: i64,
        end: i64,
    ) -> StoreResult<Vec<ScoredMember>> {
        self.store.zrange_with_scores(key, start, end).await
    }

    /// Members ranked `start..=end` in descending score order.
    pub async fn range_with_scores_reverse(
        &self,
        key: &str,
        start: i64,
        end: i64,
    ) -> StoreResult<Vec<ScoredMember>> {
        self.store.zrevrange_with_scores(key, start, end).await
    }

    /// Sets a TTL on `key`. Returns whether the key existed.
    pub async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        check_ttl(ttl)?;
        self.store.expire(key, ttl).await
    }

    /// Enqueues `value`. Items come back out of
    /// [`RelationshipStore::pop_list_item`] in the order they were pushed.
    pub async fn push_list_item(&self, key: &str, value: &str) -> StoreResult<()> {
        self.store.lpush(key, value).await.map(|_| ())
    }

    pub async fn pop_list_item(&self, key: &str) -> StoreResult<Option<String>> {
        self.store.rpop(key).await
    }

    pub async fn list_length(&self, key: &str) -> StoreResult<u64> {
        self.store.llen(key).await
    }

    /// Overwrites the value at `key` and clears any TTL.
    pub async fn set_scalar(&self, key: &str, value: &str) -> StoreResult<()> {
        self.store.set(key, value).await
    }

    pub async fn set_scalar_with_expiry(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> StoreResult<()> {
        check_ttl(ttl)?;
        self.store.set_with_expiry(key, value, ttl).await
    }

    pub async fn get_scalar(&self, key: &str) -> StoreResult<Option<String>> {
        self.store.get(key).await
    }

    pub async fn add_set_member(&self, key: &str, value: &str) -> StoreResult<()> {
        self.store.sadd(key, value).await.map(|_| ())
    }

    pub async fn remove_set_member(&self, key: &str, value: &str) -> StoreResult<()> {
        self.store.srem(key, value).await.map(|_| ())
    }

    pub async fn members(&self, key: &str) -> StoreResult<HashSet<String>> {
        self.store.smembers(key).await
    }
}

fn check_score(name: &str, score: f64) -> StoreResult<()> {
    if score.is_nan() {
        return Err(StoreError::InvalidArgument(format!("{} must not be NaN", name)));
    }

    Ok(())
}

/// TTLs go to the store in whole seconds, and zero would delete the key.
fn check_ttl(ttl: Duration) -> StoreResult<()> {
    if ttl.as_secs() == 0 {
        return Err(StoreError::InvalidArgument(format!(
            "TTL must be at least one second, got {:?}",
            ttl
        )));
    }

    Ok(())
}

fn window(current_time: f64, historical_time: f64) -> StoreResult<(f64, f64)> {
    check_score("current time", current_time)?;
    check_score("historical time", historical_time)?;

    Ok((
        historical_time.min(current_time),
        historical_time.max(current_time),
    ))
}
