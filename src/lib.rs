//! Relationship scoring, counters, queues and sets on top of a
//! Redis-compatible store.
//!
//! [`RelationshipStore`] maps domain operations onto store primitives:
//!
//! - Counters (GET, INCR)
//! - Time-windowed relationship scores (ZADD, ZCOUNT, ZRANGEBYSCORE, ZINCRBY)
//! - FIFO queues (LPUSH, RPOP, LLEN)
//! - Member sets (SADD, SREM, SMEMBERS)
//! - String values with optional expiry (SET, EXPIRE)
//!
//! The store is reached through the [`Store`] trait. [`RedisStore`] talks to a
//! server through the `redis` crate; [`MemoryStore`] keeps everything in
//! process.
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use relationship_store::{RelationshipStore, StoreConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = StoreConfig::builder().host("localhost").build()?;
//! let relationships = RelationshipStore::connect(config).await?;
//!
//! relationships
//!     .add_score_with_expiry("follows:42", "user:7", 1_700_000_000.0, Duration::from_secs(86_400))
//!     .await?;
//! let recent = relationships
//!     .count_in_range("follows:42", 1_700_000_100.0, 1_699_999_000.0)
//!     .await?;
//! assert_eq!(recent, 1);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod key_value_store;
pub mod redis_store;
pub mod relationship_store;
pub mod sorted_set;
pub mod store;

pub use config::{ConfigError, StoreConfig, StoreConfigBuilder};
pub use error::{StoreError, StoreResult};
pub use key_value_store::MemoryStore;
pub use redis_store::RedisStore;
pub use relationship_store::RelationshipStore;
pub use store::{ScoreBound, ScoredMember, Store};
