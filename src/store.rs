//! The primitive operations the relationship layer needs from a store.
//!
//! Each method is one atomic primitive on the store side. The only
//! compositions are [`Store::set_with_expiry`] and [`Store::zadd_with_expiry`],
//! whose default implementations issue two separate calls; backends that can
//! apply both in one step override them.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{StoreError, StoreResult};

/// A sorted-set member together with its score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMember {
    pub member: String,
    pub score: f64,
}

impl ScoredMember {
    pub fn new(member: impl Into<String>, score: f64) -> Self {
        Self {
            member: member.into(),
            score,
        }
    }
}

/// One end of a score interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoreBound {
    Inclusive(f64),
    Exclusive(f64),
    NegInfinity,
    PosInfinity,
}

impl ScoreBound {
    /// Whether `score` lies on the admitted side of this bound used as the
    /// lower end of an interval.
    pub fn admits_as_min(&self, score: f64) -> bool {
        match *self {
            ScoreBound::Inclusive(bound) => score >= bound,
            ScoreBound::Exclusive(bound) => score > bound,
            ScoreBound::NegInfinity => true,
            ScoreBound::PosInfinity => score == f64::INFINITY,
        }
    }

    /// Whether `score` lies on the admitted side of this bound used as the
    /// upper end of an interval.
    pub fn admits_as_max(&self, score: f64) -> bool {
        match *self {
            ScoreBound::Inclusive(bound) => score <= bound,
            ScoreBound::Exclusive(bound) => score < bound,
            ScoreBound::NegInfinity => score == f64::NEG_INFINITY,
            ScoreBound::PosInfinity => true,
        }
    }

    pub(crate) fn is_nan(&self) -> bool {
        match *self {
            ScoreBound::Inclusive(bound) | ScoreBound::Exclusive(bound) => bound.is_nan(),
            ScoreBound::NegInfinity | ScoreBound::PosInfinity => false,
        }
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Overwrites the value and clears any TTL on `key`.
    async fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        self.set(key, value).await?;
        expiry_step(key, self.expire(key, ttl).await)
    }

    /// Removes `key` whatever it holds. Returns whether it existed.
    async fn del(&self, key: &str) -> StoreResult<bool>;

    /// Fails with [`StoreError::Rejected`] when `key` does not exist.
    async fn rename(&self, key: &str, new_key: &str) -> StoreResult<()>;

    /// Adds one to the integer at `key`, starting from zero when absent.
    async fn incr(&self, key: &str) -> StoreResult<i64>;

    /// Sets a TTL on `key`. Returns `false` when the key does not exist.
    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool>;

    async fn zadd(&self, key: &str, member: &str, score: f64) -> StoreResult<()>;

    async fn zadd_with_expiry(
        &self,
        key: &str,
        member: &str,
        score: f64,
        ttl: Duration,
    ) -> StoreResult<()> {
        self.zadd(key, member, score).await?;
        expiry_step(key, self.expire(key, ttl).await)
    }

    async fn zscore(&self, key: &str, member: &str) -> StoreResult<Option<f64>>;

    /// Adds `delta` to the member's score, creating it at `delta`. Returns the
    /// new score.
    async fn zincrby(&self, key: &str, member: &str, delta: f64) -> StoreResult<f64>;

    async fn zcount(&self, key: &str, min: ScoreBound, max: ScoreBound) -> StoreResult<u64>;

    /// Members with scores between `min` and `max` in ascending order, after
    /// skipping `offset` of them and returning at most `count`.
    async fn zrange_by_score(
        &self,
        key: &str,
        min: ScoreBound,
        max: ScoreBound,
        offset: u64,
        count: u64,
    ) -> StoreResult<Vec<ScoredMember>>;

    /// Members between ranks `start` and `stop` inclusive, ascending.
    /// Negative ranks count from the end.
    async fn zrange_with_scores(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> StoreResult<Vec<ScoredMember>>;

    /// Like [`Store::zrange_with_scores`] with ranks taken from the highest
    /// score down.
    async fn zrevrange_with_scores(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> StoreResult<Vec<ScoredMember>>;

    /// Pushes to the head of the list. Returns the new length.
    async fn lpush(&self, key: &str, value: &str) -> StoreResult<u64>;

    /// Pops from the tail of the list.
    async fn rpop(&self, key: &str) -> StoreResult<Option<String>>;

    async fn llen(&self, key: &str) -> StoreResult<u64>;

    /// Returns whether `member` was newly added.
    async fn sadd(&self, key: &str, member: &str) -> StoreResult<bool>;

    /// Returns whether `member` was present.
    async fn srem(&self, key: &str, member: &str) -> StoreResult<bool>;

    async fn smembers(&self, key: &str) -> StoreResult<HashSet<String>>;
}

fn expiry_step(key: &str, outcome: StoreResult<bool>) -> StoreResult<()> {
    match outcome {
        Ok(true) => Ok(()),
        Ok(false) => Err(StoreError::PartialCompositeFailure {
            key: key.to_string(),
            reason: "key no longer exists".to_string(),
        }),
        Err(e) => Err(StoreError::PartialCompositeFailure {
            key: key.to_string(),
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::ScoreBound;

    #[test]
    fn test_score_bounds() {
        let test_cases = vec![
            (ScoreBound::Inclusive(5.0), 5.0, true, true),
            (ScoreBound::Exclusive(5.0), 5.0, false, false),
            (ScoreBound::Inclusive(5.0), 4.0, false, true),
            (ScoreBound::Inclusive(5.0), 6.0, true, false),
            (ScoreBound::NegInfinity, f64::NEG_INFINITY, true, true),
            (ScoreBound::NegInfinity, 0.0, true, false),
            (ScoreBound::PosInfinity, 0.0, false, true),
            (ScoreBound::PosInfinity, f64::INFINITY, true, true),
        ];

        for (bound, score, as_min, as_max) in test_cases {
            assert_eq!(bound.admits_as_min(score), as_min, "{:?} as min for {}", bound, score);
            assert_eq!(bound.admits_as_max(score), as_max, "{:?} as max for {}", bound, score);
        }
    }
}
