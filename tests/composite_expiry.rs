use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use relationship_store::{
    MemoryStore, RelationshipStore, ScoreBound, ScoredMember, Store, StoreError, StoreResult,
};

/// Delegates to a [`MemoryStore`] but only implements the primitives, so the
/// two-step compositions run through the trait's default implementations.
/// EXPIRE can be made to fail on demand.
#[derive(Clone, Default)]
struct PrimitiveOnlyStore {
    inner: MemoryStore,
    fail_expire: Arc<AtomicBool>,
}

#[async_trait]
impl Store for PrimitiveOnlyStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.inner.set(key, value).await
    }

    async fn del(&self, key: &str) -> StoreResult<bool> {
        self.inner.del(key).await
    }

    async fn rename(&self, key: &str, new_key: &str) -> StoreResult<()> {
        self.inner.rename(key, new_key).await
    }

    async fn incr(&self, key: &str) -> StoreResult<i64> {
        self.inner.incr(key).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        if self.fail_expire.load(Ordering::SeqCst) {
            return Err(StoreError::StoreUnavailable("connection reset".to_string()));
        }
        self.inner.expire(key, ttl).await
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> StoreResult<()> {
        self.inner.zadd(key, member, score).await
    }

    async fn zscore(&self, key: &str, member: &str) -> StoreResult<Option<f64>> {
        self.inner.zscore(key, member).await
    }

    async fn zincrby(&self, key: &str, member: &str, delta: f64) -> StoreResult<f64> {
        self.inner.zincrby(key, member, delta).await
    }

    async fn zcount(&self, key: &str, min: ScoreBound, max: ScoreBound) -> StoreResult<u64> {
        self.inner.zcount(key, min, max).await
    }

    async fn zrange_by_score(
        &self,
        key: &str,
        min: ScoreBound,
        max: ScoreBound,
        offset: u64,
        count: u64,
    ) -> StoreResult<Vec<ScoredMember>> {
        self.inner.zrange_by_score(key, min, max, offset, count).await
    }

    async fn zrange_with_scores(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> StoreResult<Vec<ScoredMember>> {
        self.inner.zrange_with_scores(key, start, stop).await
    }

    async fn zrevrange_with_scores(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> StoreResult<Vec<ScoredMember>> {
        self.inner.zrevrange_with_scores(key, start, stop).await
    }

    async fn lpush(&self, key: &str, value: &str) -> StoreResult<u64> {
        self.inner.lpush(key, value).await
    }

    async fn rpop(&self, key: &str) -> StoreResult<Option<String>> {
        self.inner.rpop(key).await
    }

    async fn llen(&self, key: &str) -> StoreResult<u64> {
        self.inner.llen(key).await
    }

    async fn sadd(&self, key: &str, member: &str) -> StoreResult<bool> {
        self.inner.sadd(key, member).await
    }

    async fn srem(&self, key: &str, member: &str) -> StoreResult<bool> {
        self.inner.srem(key, member).await
    }

    async fn smembers(&self, key: &str) -> StoreResult<HashSet<String>> {
        self.inner.smembers(key).await
    }
}

#[tokio::test]
async fn test_two_step_expiry_succeeds() {
    let store = PrimitiveOnlyStore::default();
    let relationships = RelationshipStore::new(store.clone());

    relationships
        .add_score_with_expiry("recent", "a", 1.0, Duration::from_secs(30))
        .await
        .unwrap();
    relationships
        .set_scalar_with_expiry("token", "v", Duration::from_secs(30))
        .await
        .unwrap();

    assert!(store.inner.time_to_live("recent").await.is_some());
    assert!(store.inner.time_to_live("token").await.is_some());
}

#[tokio::test]
async fn test_failed_expiry_step_is_reported_as_partial() {
    let store = PrimitiveOnlyStore::default();
    store.fail_expire.store(true, Ordering::SeqCst);
    let relationships = RelationshipStore::new(store.clone());

    let score_result = relationships
        .add_score_with_expiry("recent", "a", 1.0, Duration::from_secs(30))
        .await;
    let scalar_result = relationships
        .set_scalar_with_expiry("token", "v", Duration::from_secs(30))
        .await;

    for (key, result) in [("recent", score_result), ("token", scalar_result)] {
        match result {
            Err(StoreError::PartialCompositeFailure { key: failed_key, reason }) => {
                assert_eq!(failed_key, key);
                assert!(reason.contains("connection reset"), "reason was {}", reason);
            }
            other => panic!("expected partial failure for {}, got {:?}", key, other),
        }
    }

    // The first step landed without a TTL.
    assert_eq!(relationships.get_score("recent", "a").await, Ok(Some(1.0)));
    assert_eq!(relationships.get_scalar("token").await, Ok(Some("v".to_string())));
    assert_eq!(store.inner.time_to_live("recent").await, None);

    store.fail_expire.store(false, Ordering::SeqCst);
    assert_eq!(
        relationships.expire("recent", Duration::from_secs(30)).await,
        Ok(true)
    );
    assert!(store.inner.time_to_live("recent").await.is_some());
}
