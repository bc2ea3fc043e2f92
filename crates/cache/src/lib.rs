//! Score Store: a ranked-set cache of leaderboard standings.
//!
//! The store is a derived, disposable projection of the source of truth.
//! Every operation can fail with [`CacheError::BackendUnavailable`];
//! callers treat that exactly like a missing key and fall through to a
//! rebuild or a direct computation. Nothing here is ever authoritative.
//!
//! Two adapters are provided:
//! - [`RedisScoreStore`] for a Redis-compatible backend (sorted sets).
//! - [`MemoryScoreStore`], an in-process store with the same semantics,
//!   used for local development and tests.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use stride_core::leaderboard::{CachedScore, GroundTruthScore};

pub mod memory;
pub mod redis_store;

pub use memory::MemoryScoreStore;
pub use redis_store::{RedisScoreStore, RedisStoreConfig};

/// The only failure a cache operation reports.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    #[error("Cache backend unavailable: {0}")]
    BackendUnavailable(String),
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Sorted-set semantics over opaque string keys and members.
///
/// Ranges are ordered by score descending; equal scores are ordered by
/// member descending. Ranks are 1-based.
#[async_trait]
pub trait ScoreStore: Send + Sync {
    /// Round-trip to the backend.
    async fn ping(&self) -> CacheResult<()>;

    /// Atomically add `delta` to `member`, creating it at `delta` if absent.
    async fn increment(&self, key: &str, member: &str, delta: f64) -> CacheResult<CachedScore>;

    /// Set an exact score for `member`.
    async fn set_score(&self, key: &str, member: &str, score: GroundTruthScore) -> CacheResult<()>;

    /// Set exact scores for many members.
    async fn set_scores(
        &self,
        key: &str,
        scores: &[(String, GroundTruthScore)],
    ) -> CacheResult<()> {
        for (member, score) in scores {
            self.set_score(key, member, *score).await?;
        }
        Ok(())
    }

    /// Replace a leaderboard and its companion keys with `snapshot`, all
    /// with the same TTL.
    ///
    /// Every key named by the snapshot is deleted first. When
    /// `snapshot.scores` is empty all of them are left absent. Adapters
    /// that can do so apply the whole replacement atomically; this default
    /// composes the primitives and does not.
    async fn replace_snapshot(&self, snapshot: &Snapshot, ttl: Duration) -> CacheResult<()> {
        for key in snapshot.keys() {
            self.clear(key).await?;
        }
        if snapshot.scores.is_empty() {
            return Ok(());
        }
        self.set_scores(&snapshot.key, &snapshot.scores).await?;
        self.expire(&snapshot.key, ttl).await?;
        if let Some((key, fields)) = &snapshot.details {
            for (field, value) in fields {
                self.hash_set(key, field, value).await?;
            }
            self.expire(key, ttl).await?;
        }
        if let Some((key, members)) = &snapshot.applied {
            for member in members {
                self.claim_member(key, member, ttl).await?;
            }
        }
        Ok(())
    }

    /// Members at positions `[offset, offset + limit)` in descending order.
    async fn range_descending(
        &self,
        key: &str,
        offset: u64,
        limit: u64,
    ) -> CacheResult<Vec<(String, CachedScore)>>;

    /// Number of members under `key`.
    async fn count(&self, key: &str) -> CacheResult<u64>;

    async fn exists(&self, key: &str) -> CacheResult<bool>;

    /// Delete `key` entirely.
    async fn clear(&self, key: &str) -> CacheResult<()>;

    /// Set the key's time-to-live.
    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<()>;

    /// 1-based rank of `member`, or `None` if absent.
    async fn rank_of(&self, key: &str, member: &str) -> CacheResult<Option<u64>>;

    async fn score_of(&self, key: &str, member: &str) -> CacheResult<Option<CachedScore>>;

    /// Set one field of a hash key.
    async fn hash_set(&self, key: &str, field: &str, value: &str) -> CacheResult<()>;

    /// All fields of a hash key (empty when absent).
    async fn hash_get_all(&self, key: &str) -> CacheResult<HashMap<String, String>>;

    /// Set one field of a hash key unless it is already present. Returns
    /// `true` when this call wrote it.
    async fn hash_set_if_absent(&self, key: &str, field: &str, value: &str) -> CacheResult<bool>;

    /// Add `member` to the set at `key` and refresh the set's TTL. Returns
    /// `true` when the member was not already present.
    async fn claim_member(&self, key: &str, member: &str, ttl: Duration) -> CacheResult<bool>;

    /// Remove `member` from the set at `key`.
    async fn release_member(&self, key: &str, member: &str) -> CacheResult<()>;
}

/// Everything a rebuild writes for one leaderboard.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    /// Sorted-set key holding the standings.
    pub key: String,
    pub scores: Vec<(String, GroundTruthScore)>,
    /// Hash key and fields with per-member details.
    pub details: Option<(String, Vec<(String, String)>)>,
    /// Set key and the activity ids already folded into `scores`.
    pub applied: Option<(String, Vec<String>)>,
}

impl Snapshot {
    pub fn new(key: impl Into<String>, scores: Vec<(String, GroundTruthScore)>) -> Self {
        Self {
            key: key.into(),
            scores,
            details: None,
            applied: None,
        }
    }

    pub fn with_details(mut self, key: impl Into<String>, fields: Vec<(String, String)>) -> Self {
        self.details = Some((key.into(), fields));
        self
    }

    pub fn with_applied(mut self, key: impl Into<String>, members: Vec<String>) -> Self {
        self.applied = Some((key.into(), members));
        self
    }

    /// Every key this snapshot replaces.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.key.as_str())
            .chain(self.details.as_ref().map(|(key, _)| key.as_str()))
            .chain(self.applied.as_ref().map(|(key, _)| key.as_str()))
    }
}
