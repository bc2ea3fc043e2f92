//! Redis adapter for the Score Store.
//!
//! Leaderboards map onto Redis sorted sets (`ZINCRBY`, `ZADD`,
//! `ZREVRANGE ... WITHSCORES`, `ZCARD`, `ZREVRANK`, `ZSCORE`), challenge
//! progress details onto hashes, and applied activity ids onto sets.
//! Rebuilds replace a leaderboard and its companion keys in one
//! `MULTI`/`EXEC` pipeline.
//!
//! The connection is a multiplexed [`ConnectionManager`] created lazily on
//! first use. A backend that is down at startup does not prevent the
//! service from booting; every operation simply reports
//! [`CacheError::BackendUnavailable`] until a connection succeeds.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{AsyncCommands, Client, RedisError};
use stride_core::leaderboard::{CachedScore, GroundTruthScore};
use tokio::sync::OnceCell;

use crate::{CacheError, CacheResult, ScoreStore, Snapshot};

/// Default connection timeout. Kept short: a slow cache is worth less than
/// a direct computation.
const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_millis(100);

/// Connection settings for [`RedisScoreStore`].
#[derive(Debug, Clone)]
pub struct RedisStoreConfig {
    pub url: String,
    pub connection_timeout: Duration,
    pub number_of_retries: usize,
}

impl RedisStoreConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
            number_of_retries: 1,
        }
    }
}

pub struct RedisScoreStore {
    client: Client,
    config: RedisStoreConfig,
    connection: OnceCell<ConnectionManager>,
}

impl RedisScoreStore {
    /// Parse the URL and prepare a lazily connecting store.
    pub fn new(config: RedisStoreConfig) -> CacheResult<Self> {
        let client = Client::open(config.url.as_str()).map_err(unavailable)?;
        Ok(Self {
            client,
            config,
            connection: OnceCell::new(),
        })
    }

    /// Get a handle to the shared connection, connecting if needed.
    ///
    /// A failed attempt leaves the cell empty so the next call retries.
    async fn conn(&self) -> CacheResult<ConnectionManager> {
        let manager = self
            .connection
            .get_or_try_init(|| async {
                let manager_config = ConnectionManagerConfig::new()
                    .set_number_of_retries(self.config.number_of_retries)
                    .set_connection_timeout(self.config.connection_timeout);
                let manager = self
                    .client
                    .get_connection_manager_with_config(manager_config)
                    .await?;
                tracing::info!("Connected to Redis score store");
                Ok::<_, RedisError>(manager)
            })
            .await
            .map_err(unavailable)?;
        Ok(manager.clone())
    }
}

/// TTLs are sent in milliseconds so sub-second lifetimes survive.
fn ttl_millis(ttl: Duration) -> i64 {
    ttl.as_millis().clamp(1, i64::MAX as u128) as i64
}

fn unavailable(err: RedisError) -> CacheError {
    tracing::debug!(error = %err, "Redis operation failed");
    CacheError::BackendUnavailable(err.to_string())
}

#[async_trait]
impl ScoreStore for RedisScoreStore {
    async fn ping(&self) -> CacheResult<()> {
        let mut conn = self.conn().await?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn increment(&self, key: &str, member: &str, delta: f64) -> CacheResult<CachedScore> {
        let mut conn = self.conn().await?;
        let score: f64 = conn.zincr(key, member, delta).await.map_err(unavailable)?;
        Ok(CachedScore::from_cache(score))
    }

    async fn set_score(&self, key: &str, member: &str, score: GroundTruthScore) -> CacheResult<()> {
        let mut conn = self.conn().await?;
        let _: () = conn
            .zadd(key, member, score.value())
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn set_scores(
        &self,
        key: &str,
        scores: &[(String, GroundTruthScore)],
    ) -> CacheResult<()> {
        if scores.is_empty() {
            return Ok(());
        }
        let items: Vec<(f64, &str)> = scores
            .iter()
            .map(|(member, score)| (score.value(), member.as_str()))
            .collect();
        let mut conn = self.conn().await?;
        let _: () = conn
            .zadd_multiple(key, &items)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn replace_snapshot(&self, snapshot: &Snapshot, ttl: Duration) -> CacheResult<()> {
        let ttl = ttl_millis(ttl);
        let mut pipe = redis::pipe();
        pipe.atomic();
        for key in snapshot.keys() {
            pipe.del(key).ignore();
        }
        if !snapshot.scores.is_empty() {
            let items: Vec<(f64, &str)> = snapshot
                .scores
                .iter()
                .map(|(member, score)| (score.value(), member.as_str()))
                .collect();
            pipe.zadd_multiple(&snapshot.key, &items)
                .ignore()
                .pexpire(&snapshot.key, ttl)
                .ignore();
            if let Some((key, fields)) = snapshot.details.as_ref().filter(|(_, f)| !f.is_empty()) {
                pipe.hset_multiple(key, fields).ignore().pexpire(key, ttl).ignore();
            }
            if let Some((key, members)) = snapshot.applied.as_ref().filter(|(_, m)| !m.is_empty()) {
                pipe.sadd(key, members).ignore().pexpire(key, ttl).ignore();
            }
        }
        let mut conn = self.conn().await?;
        let _: () = pipe.query_async(&mut conn).await.map_err(unavailable)?;
        Ok(())
    }

    async fn range_descending(
        &self,
        key: &str,
        offset: u64,
        limit: u64,
    ) -> CacheResult<Vec<(String, CachedScore)>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let start = offset as isize;
        let stop = (offset + limit - 1) as isize;
        let mut conn = self.conn().await?;
        let rows: Vec<(String, f64)> = conn
            .zrevrange_withscores(key, start, stop)
            .await
            .map_err(unavailable)?;
        Ok(rows
            .into_iter()
            .map(|(member, score)| (member, CachedScore::from_cache(score)))
            .collect())
    }

    async fn count(&self, key: &str) -> CacheResult<u64> {
        let mut conn = self.conn().await?;
        conn.zcard(key).await.map_err(unavailable)
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.conn().await?;
        conn.exists(key).await.map_err(unavailable)
    }

    async fn clear(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.conn().await?;
        let _: () = conn.del(key).await.map_err(unavailable)?;
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<()> {
        let mut conn = self.conn().await?;
        let _: () = conn
            .pexpire(key, ttl_millis(ttl))
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn rank_of(&self, key: &str, member: &str) -> CacheResult<Option<u64>> {
        let mut conn = self.conn().await?;
        let rank: Option<u64> = conn.zrevrank(key, member).await.map_err(unavailable)?;
        Ok(rank.map(|r| r + 1))
    }

    async fn score_of(&self, key: &str, member: &str) -> CacheResult<Option<CachedScore>> {
        let mut conn = self.conn().await?;
        let score: Option<f64> = conn.zscore(key, member).await.map_err(unavailable)?;
        Ok(score.map(CachedScore::from_cache))
    }

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> CacheResult<()> {
        let mut conn = self.conn().await?;
        let _: () = conn.hset(key, field, value).await.map_err(unavailable)?;
        Ok(())
    }

    async fn hash_get_all(&self, key: &str) -> CacheResult<HashMap<String, String>> {
        let mut conn = self.conn().await?;
        conn.hgetall(key).await.map_err(unavailable)
    }

    async fn hash_set_if_absent(&self, key: &str, field: &str, value: &str) -> CacheResult<bool> {
        let mut conn = self.conn().await?;
        conn.hset_nx(key, field, value).await.map_err(unavailable)
    }

    async fn claim_member(&self, key: &str, member: &str, ttl: Duration) -> CacheResult<bool> {
        let mut conn = self.conn().await?;
        let (added,): (u64,) = redis::pipe()
            .atomic()
            .sadd(key, member)
            .pexpire(key, ttl_millis(ttl))
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;
        Ok(added == 1)
    }

    async fn release_member(&self, key: &str, member: &str) -> CacheResult<()> {
        let mut conn = self.conn().await?;
        let _: () = conn.srem(key, member).await.map_err(unavailable)?;
        Ok(())
    }
}
