//! [`Store`] backed by a Redis-compatible server.
//!
//! Requests go through a [`ConnectionManager`], which multiplexes them over
//! one connection. When a request fails because the connection dropped, the
//! manager dials a replacement in the background and later requests use it.
//! The failed request itself is never retried.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{AsyncCommands, Client, RedisError};
use tracing::{debug, warn};

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::store::{ScoreBound, ScoredMember, Store};

#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
    config: Arc<StoreConfig>,
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore")
            .field("config", &self.config)
            .finish()
    }
}

impl RedisStore {
    /// Dials the store described by `config`, authenticating and selecting
    /// the database when configured.
    pub async fn connect(config: StoreConfig) -> StoreResult<Self> {
        let address = config.address();
        debug!(%address, "connecting to store");

        let client = Client::open(config.connection_info())
            .map_err(|e| StoreError::StoreUnavailable(e.to_string()))?;

        let mut manager_config =
            ConnectionManagerConfig::new().set_number_of_retries(config.connection_retries);
        if let Some(connect_timeout) = config.connect_timeout {
            manager_config = manager_config.set_connection_timeout(connect_timeout);
        }
        if let Some(response_timeout) = config.response_timeout {
            manager_config = manager_config.set_response_timeout(response_timeout);
        }

        // Every failure while establishing the connection, a refused AUTH
        // included, means the store cannot be used.
        let manager = ConnectionManager::new_with_config(client, manager_config)
            .await
            .map_err(|e| StoreError::StoreUnavailable(e.to_string()))?;
        debug!(%address, "connected to store");

        Ok(Self {
            manager,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn connection(&self) -> ConnectionManager {
        self.manager.clone()
    }

    fn failure(&self, command: &'static str, err: RedisError) -> StoreError {
        let error = StoreError::from(err);

        if error.is_unavailable() {
            warn!(address = %self.config.address(), command, error = %error, "store request failed");
        }

        error
    }
}

/// Formats a score the way the store parses floats.
fn score_arg(score: f64) -> String {
    if score == f64::INFINITY {
        "+inf".to_string()
    } else if score == f64::NEG_INFINITY {
        "-inf".to_string()
    } else {
        score.to_string()
    }
}

fn bound_arg(bound: ScoreBound) -> String {
    match bound {
        ScoreBound::Inclusive(score) => score_arg(score),
        ScoreBound::Exclusive(score) => format!("({}", score_arg(score)),
        ScoreBound::NegInfinity => "-inf".to_string(),
        ScoreBound::PosInfinity => "+inf".to_string(),
    }
}

fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs()
}

fn scored_members(pairs: Vec<(String, f64)>) -> Vec<ScoredMember> {
    pairs
        .into_iter()
        .map(|(member, score)| ScoredMember::new(member, score))
        .collect()
}

fn rank_arg(rank: i64) -> isize {
    isize::try_from(rank).unwrap_or(if rank < 0 { isize::MIN } else { isize::MAX })
}

#[async_trait]
impl Store for RedisStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.connection()
            .get(key)
            .await
            .map_err(|e| self.failure("GET", e))
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.connection()
            .set(key, value)
            .await
            .map_err(|e| self.failure("SET", e))
    }

    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        self.connection()
            .set_ex(key, value, ttl_secs(ttl))
            .await
            .map_err(|e| self.failure("SETEX", e))
    }

    async fn del(&self, key: &str) -> StoreResult<bool> {
        let removed: u64 = self
            .connection()
            .del(key)
            .await
            .map_err(|e| self.failure("DEL", e))?;
        Ok(removed > 0)
    }

    async fn rename(&self, key: &str, new_key: &str) -> StoreResult<()> {
        self.connection()
            .rename(key, new_key)
            .await
            .map_err(|e| self.failure("RENAME", e))
    }

    async fn incr(&self, key: &str) -> StoreResult<i64> {
        self.connection()
            .incr(key, 1_i64)
            .await
            .map_err(|e| self.failure("INCRBY", e))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        let seconds = i64::try_from(ttl_secs(ttl)).unwrap_or(i64::MAX);

        self.connection()
            .expire(key, seconds)
            .await
            .map_err(|e| self.failure("EXPIRE", e))
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> StoreResult<()> {
        let _: u64 = self
            .connection()
            .zadd(key, member, score_arg(score))
            .await
            .map_err(|e| self.failure("ZADD", e))?;
        Ok(())
    }

    /// Applies the upsert and the expiry in one MULTI/EXEC transaction.
    async fn zadd_with_expiry(
        &self,
        key: &str,
        member: &str,
        score: f64,
        ttl: Duration,
    ) -> StoreResult<()> {
        let seconds = i64::try_from(ttl_secs(ttl)).unwrap_or(i64::MAX);

        let (_, applied): (u64, bool) = redis::pipe()
            .atomic()
            .zadd(key, member, score_arg(score))
            .expire(key, seconds)
            .query_async(&mut self.connection())
            .await
            .map_err(|e| self.failure("EXEC", e))?;

        if !applied {
            return Err(StoreError::PartialCompositeFailure {
                key: key.to_string(),
                reason: "EXPIRE did not apply".to_string(),
            });
        }

        Ok(())
    }

    async fn zscore(&self, key: &str, member: &str) -> StoreResult<Option<f64>> {
        self.connection()
            .zscore(key, member)
            .await
            .map_err(|e| self.failure("ZSCORE", e))
    }

    async fn zincrby(&self, key: &str, member: &str, delta: f64) -> StoreResult<f64> {
        self.connection()
            .zincr(key, member, score_arg(delta))
            .await
            .map_err(|e| self.failure("ZINCRBY", e))
    }

    async fn zcount(&self, key: &str, min: ScoreBound, max: ScoreBound) -> StoreResult<u64> {
        self.connection()
            .zcount(key, bound_arg(min), bound_arg(max))
            .await
            .map_err(|e| self.failure("ZCOUNT", e))
    }

    async fn zrange_by_score(
        &self,
        key: &str,
        min: ScoreBound,
        max: ScoreBound,
        offset: u64,
        count: u64,
    ) -> StoreResult<Vec<ScoredMember>> {
        if count == 0 {
            return Ok(Vec::new());
        }

        // A negative count means "no limit" to the store.
        let offset = isize::try_from(offset).unwrap_or(isize::MAX);
        let count = isize::try_from(count).unwrap_or(isize::MAX);

        let pairs: Vec<(String, f64)> = self
            .connection()
            .zrangebyscore_limit_withscores(key, bound_arg(min), bound_arg(max), offset, count)
            .await
            .map_err(|e| self.failure("ZRANGEBYSCORE", e))?;
        Ok(scored_members(pairs))
    }

    async fn zrange_with_scores(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> StoreResult<Vec<ScoredMember>> {
        let pairs: Vec<(String, f64)> = self
            .connection()
            .zrange_withscores(key, rank_arg(start), rank_arg(stop))
            .await
            .map_err(|e| self.failure("ZRANGE", e))?;
        Ok(scored_members(pairs))
    }

    async fn zrevrange_with_scores(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> StoreResult<Vec<ScoredMember>> {
        let pairs: Vec<(String, f64)> = self
            .connection()
            .zrevrange_withscores(key, rank_arg(start), rank_arg(stop))
            .await
            .map_err(|e| self.failure("ZREVRANGE", e))?;
        Ok(scored_members(pairs))
    }

    async fn lpush(&self, key: &str, value: &str) -> StoreResult<u64> {
        self.connection()
            .lpush(key, value)
            .await
            .map_err(|e| self.failure("LPUSH", e))
    }

    async fn rpop(&self, key: &str) -> StoreResult<Option<String>> {
        self.connection()
            .rpop(key, None)
            .await
            .map_err(|e| self.failure("RPOP", e))
    }

    async fn llen(&self, key: &str) -> StoreResult<u64> {
        self.connection()
            .llen(key)
            .await
            .map_err(|e| self.failure("LLEN", e))
    }

    async fn sadd(&self, key: &str, member: &str) -> StoreResult<bool> {
        let added: u64 = self
            .connection()
            .sadd(key, member)
            .await
            .map_err(|e| self.failure("SADD", e))?;
        Ok(added > 0)
    }

    async fn srem(&self, key: &str, member: &str) -> StoreResult<bool> {
        let removed: u64 = self
            .connection()
            .srem(key, member)
            .await
            .map_err(|e| self.failure("SREM", e))?;
        Ok(removed > 0)
    }

    async fn smembers(&self, key: &str) -> StoreResult<HashSet<String>> {
        self.connection()
            .smembers(key)
            .await
            .map_err(|e| self.failure("SMEMBERS", e))
    }
}
