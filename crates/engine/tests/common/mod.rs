#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use stride_cache::{CacheResult, MemoryScoreStore, ScoreStore, Snapshot};
use stride_core::leaderboard::{CachedScore, GroundTruthScore};
use tokio::sync::Notify;
use stride_core::activity::{Activity, NewActivity};
use stride_core::challenge::{Challenge, ChallengeStatus};
use stride_core::conversion::RateScope;
use stride_core::types::DbId;
use stride_engine::{EngineConfig, LeaderboardEngine, MemorySourceStore};

pub const CLUB: DbId = 100;
pub const ALICE: DbId = 1;
pub const BOB: DbId = 2;
pub const CAROL: DbId = 3;

/// Engine over in-process stores, with handles kept for seeding and for
/// toggling availability.
pub struct Harness {
    pub engine: LeaderboardEngine,
    pub source: Arc<MemorySourceStore>,
    pub scores: Arc<MemoryScoreStore>,
}

/// A validated activity recorded now.
pub fn activity(user_id: DbId, activity_type: &str, value: f64, unit: &str) -> NewActivity {
    NewActivity::new(user_id, activity_type, value, unit, Utc::now()).unwrap()
}

pub fn harness() -> Harness {
    harness_with(EngineConfig::default())
}

pub fn harness_with(config: EngineConfig) -> Harness {
    let source = Arc::new(MemorySourceStore::new());
    let scores = Arc::new(MemoryScoreStore::new());
    let engine = LeaderboardEngine::new(source.clone(), scores.clone(), config);
    Harness {
        engine,
        source,
        scores,
    }
}

/// Engine writing through a wrapper around the in-process store. The
/// harness keeps the unwrapped store for inspection.
pub fn harness_wrapped<S>(wrap: impl FnOnce(Arc<MemoryScoreStore>) -> S) -> Harness
where
    S: ScoreStore + 'static,
{
    let source = Arc::new(MemorySourceStore::new());
    let scores = Arc::new(MemoryScoreStore::new());
    let wrapped: Arc<dyn ScoreStore> = Arc::new(wrap(scores.clone()));
    let engine = LeaderboardEngine::new(source.clone(), wrapped, EngineConfig::default());
    Harness {
        engine,
        source,
        scores,
    }
}

impl Harness {
    /// Club `CLUB` with Alice and Bob, run/km worth 10 points and
    /// walk/km worth 5.
    pub async fn seed_club(&self) {
        self.source.add_profile(ALICE, "Alice", Some("https://cdn.example/a.png")).await;
        self.source.add_profile(BOB, "Bob", None).await;
        self.source.add_club_member(CLUB, ALICE).await;
        self.source.add_club_member(CLUB, BOB).await;
        self.source.set_rate(RateScope::Global, "run", "kilometers", 10.0).await;
        self.source.set_rate(RateScope::Global, "walk", "kilometers", 5.0).await;
    }

    /// Write an activity through the engine and wait for its side effects.
    pub async fn record(
        &self,
        user_id: DbId,
        activity_type: &str,
        value: f64,
        unit: &str,
    ) -> Activity {
        let input = activity(user_id, activity_type, value, unit);
        let (activity, update) = self.engine.record_activity(input).await.unwrap();
        update.mirror.wait().await;
        activity
    }

    /// Write an activity without touching the cache.
    pub async fn insert_only(
        &self,
        user_id: DbId,
        activity_type: &str,
        value: f64,
        unit: &str,
    ) -> Activity {
        use stride_engine::SourceStore;
        let input = activity(user_id, activity_type, value, unit);
        self.source.insert_activity(input).await.unwrap()
    }

    pub async fn add_challenge(
        &self,
        activity_type: &str,
        unit: &str,
        target_value: f64,
    ) -> Challenge {
        self.source
            .add_challenge(Challenge {
                id: 0,
                name: format!("{activity_type} challenge"),
                activity_type: activity_type.to_string(),
                unit: unit.to_string(),
                target_value,
                status: ChallengeStatus::Active,
                start_date: Utc::now() - Duration::days(1),
                end_date: Some(Utc::now() + Duration::days(30)),
            })
            .await
    }
}

/// Score store that holds the first increment by `delta` until `gate` is
/// notified. Every other call goes straight through.
pub struct HeldIncrement {
    inner: Arc<MemoryScoreStore>,
    delta: f64,
    held: AtomicBool,
    gate: Arc<Notify>,
}

impl HeldIncrement {
    pub fn new(inner: Arc<MemoryScoreStore>, delta: f64, gate: Arc<Notify>) -> Self {
        Self {
            inner,
            delta,
            held: AtomicBool::new(false),
            gate,
        }
    }
}

#[async_trait]
impl ScoreStore for HeldIncrement {
    async fn ping(&self) -> CacheResult<()> {
        self.inner.ping().await
    }

    async fn increment(&self, key: &str, member: &str, delta: f64) -> CacheResult<CachedScore> {
        if delta == self.delta && !self.held.swap(true, Ordering::SeqCst) {
            self.gate.notified().await;
        }
        self.inner.increment(key, member, delta).await
    }

    async fn set_score(&self, key: &str, member: &str, score: GroundTruthScore) -> CacheResult<()> {
        self.inner.set_score(key, member, score).await
    }

    async fn replace_snapshot(&self, snapshot: &Snapshot, ttl: StdDuration) -> CacheResult<()> {
        self.inner.replace_snapshot(snapshot, ttl).await
    }

    async fn range_descending(
        &self,
        key: &str,
        offset: u64,
        limit: u64,
    ) -> CacheResult<Vec<(String, CachedScore)>> {
        self.inner.range_descending(key, offset, limit).await
    }

    async fn count(&self, key: &str) -> CacheResult<u64> {
        self.inner.count(key).await
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        self.inner.exists(key).await
    }

    async fn clear(&self, key: &str) -> CacheResult<()> {
        self.inner.clear(key).await
    }

    async fn expire(&self, key: &str, ttl: StdDuration) -> CacheResult<()> {
        self.inner.expire(key, ttl).await
    }

    async fn rank_of(&self, key: &str, member: &str) -> CacheResult<Option<u64>> {
        self.inner.rank_of(key, member).await
    }

    async fn score_of(&self, key: &str, member: &str) -> CacheResult<Option<CachedScore>> {
        self.inner.score_of(key, member).await
    }

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> CacheResult<()> {
        self.inner.hash_set(key, field, value).await
    }

    async fn hash_get_all(&self, key: &str) -> CacheResult<HashMap<String, String>> {
        self.inner.hash_get_all(key).await
    }

    async fn hash_set_if_absent(&self, key: &str, field: &str, value: &str) -> CacheResult<bool> {
        self.inner.hash_set_if_absent(key, field, value).await
    }

    async fn claim_member(
        &self,
        key: &str,
        member: &str,
        ttl: StdDuration,
    ) -> CacheResult<bool> {
        self.inner.claim_member(key, member, ttl).await
    }

    async fn release_member(&self, key: &str, member: &str) -> CacheResult<()> {
        self.inner.release_member(key, member).await
    }
}
