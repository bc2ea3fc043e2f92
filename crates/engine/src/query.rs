//! Leaderboard Query Service.
//!
//! Cache-aside read path:
//! 1. backend unavailable: compute directly from source;
//! 2. key cold: rebuild, then read the cache once more;
//! 3. warm: page from the cache;
//! 4. anything the cache could not answer falls back to the ground truth
//!    computed from source, ranked the same way the cache ranks.
//!
//! Entries are enriched with profile data in one batch lookup. Members
//! without a profile (or when the lookup fails) get a placeholder name and
//! are never dropped.

use std::collections::HashMap;
use std::sync::Arc;

use stride_cache::{CacheResult, ScoreStore};
use stride_core::leaderboard::{
    clamp_limit, clamp_offset, member_key, parse_member, rank_at, LeaderboardEntry,
    LeaderboardKey, LeaderboardPage, ScopeKind, ServedFrom, UNKNOWN_USER_NAME,
};
use stride_core::types::DbId;

use crate::error::EngineResult;
use crate::reader::{GroundTruth, ProgressDetail, SourceReader};
use crate::rebuild::RebuildOrchestrator;
use crate::source::SourceStore;

/// A leaderboard page request.
#[derive(Debug, Clone)]
pub struct LeaderboardQuery {
    pub key: LeaderboardKey,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    /// Rebuild the key unconditionally before reading.
    pub force_rebuild: bool,
}

impl LeaderboardQuery {
    pub fn new(key: LeaderboardKey) -> Self {
        Self {
            key,
            limit: None,
            offset: None,
            force_rebuild: false,
        }
    }

    pub fn page(mut self, limit: Option<i64>, offset: Option<i64>) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }

    pub fn force_rebuild(mut self, force: bool) -> Self {
        self.force_rebuild = force;
        self
    }
}

/// One ranked member before enrichment.
#[derive(Debug, Clone, Copy)]
struct Ranked {
    user_id: DbId,
    score: f64,
    rank: i64,
}

/// A page read from the cache.
struct CachedPage {
    rows: Vec<Ranked>,
    total: i64,
    details: HashMap<DbId, ProgressDetail>,
}

#[derive(Clone)]
pub struct LeaderboardService {
    source: Arc<dyn SourceStore>,
    scores: Arc<dyn ScoreStore>,
    reader: SourceReader,
    rebuilder: RebuildOrchestrator,
}

impl LeaderboardService {
    pub fn new(
        source: Arc<dyn SourceStore>,
        scores: Arc<dyn ScoreStore>,
        reader: SourceReader,
        rebuilder: RebuildOrchestrator,
    ) -> Self {
        Self {
            source,
            scores,
            reader,
            rebuilder,
        }
    }

    pub async fn get_leaderboard(&self, query: LeaderboardQuery) -> EngineResult<LeaderboardPage> {
        let key = &query.key;
        let limit = clamp_limit(query.limit);
        let offset = clamp_offset(query.offset);

        if !query.force_rebuild {
            match self.scores.exists(&key.cache_key()).await {
                Ok(true) => match self.read_cached(key, limit, offset).await {
                    Ok(Some(page)) => {
                        tracing::debug!(key = %key, "Leaderboard served from cache");
                        return Ok(self.finish(key, page, ServedFrom::Cache).await);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(
                            key = %key,
                            error = %e,
                            "Cache read failed, computing directly",
                        );
                        return self.direct(key, limit, offset).await;
                    }
                },
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Cache unavailable, computing directly");
                    return self.direct(key, limit, offset).await;
                }
            }
        }

        let outcome = self.rebuilder.rebuild(key).await?;
        if outcome.cache_warmed {
            match self.read_cached(key, limit, offset).await {
                Ok(Some(page)) => return Ok(self.finish(key, page, ServedFrom::Rebuilt).await),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Cache read after rebuild failed");
                }
            }
        }
        Ok(self
            .page_from_ground_truth(key, &outcome.ground_truth, limit, offset)
            .await)
    }

    /// One member's rank and score within a leaderboard.
    ///
    /// `Ok(None)` when the user is not ranked on that leaderboard.
    pub async fn member_standing(
        &self,
        key: &LeaderboardKey,
        user_id: DbId,
    ) -> EngineResult<Option<LeaderboardEntry>> {
        match self.scores.exists(&key.cache_key()).await {
            Ok(true) => match self.cached_standing(key, user_id).await {
                Ok(Some((ranked, details))) => {
                    return Ok(self.enrich(key, vec![ranked], &details).await.pop());
                }
                Ok(None) => return Ok(None),
                Err(e) => {
                    tracing::warn!(
                        key = %key,
                        error = %e,
                        "Cache read failed, computing directly",
                    );
                    let ground_truth = self.reader.ground_truth(key).await?;
                    return Ok(self
                        .standing_from_ground_truth(key, &ground_truth, user_id)
                        .await);
                }
            },
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cache unavailable, computing directly");
                let ground_truth = self.reader.ground_truth(key).await?;
                return Ok(self
                    .standing_from_ground_truth(key, &ground_truth, user_id)
                    .await);
            }
        }

        let outcome = self.rebuilder.rebuild(key).await?;
        Ok(self
            .standing_from_ground_truth(key, &outcome.ground_truth, user_id)
            .await)
    }

    // -----------------------------------------------------------------------
    // Cache path
    // -----------------------------------------------------------------------

    /// `Ok(None)` when the key holds no members.
    async fn read_cached(
        &self,
        key: &LeaderboardKey,
        limit: i64,
        offset: i64,
    ) -> CacheResult<Option<CachedPage>> {
        let cache_key = key.cache_key();
        let total = self.scores.count(&cache_key).await?;
        if total == 0 {
            return Ok(None);
        }
        let range = self
            .scores
            .range_descending(&cache_key, offset as u64, limit as u64)
            .await?;

        let rows = range
            .into_iter()
            .enumerate()
            .filter_map(|(index, (member, score))| match parse_member(&member) {
                Some(user_id) => Some(Ranked {
                    user_id,
                    score: score.value(),
                    rank: rank_at(offset, index),
                }),
                None => {
                    tracing::warn!(
                        key = %key,
                        member = %member,
                        "Skipping undecodable cache member",
                    );
                    None
                }
            })
            .collect();

        Ok(Some(CachedPage {
            rows,
            total: total as i64,
            details: self.cached_details(key).await?,
        }))
    }

    async fn cached_standing(
        &self,
        key: &LeaderboardKey,
        user_id: DbId,
    ) -> CacheResult<Option<(Ranked, HashMap<DbId, ProgressDetail>)>> {
        let cache_key = key.cache_key();
        let member = member_key(user_id);
        let (Some(rank), Some(score)) = (
            self.scores.rank_of(&cache_key, &member).await?,
            self.scores.score_of(&cache_key, &member).await?,
        ) else {
            return Ok(None);
        };
        let ranked = Ranked {
            user_id,
            score: score.value(),
            rank: rank as i64,
        };
        Ok(Some((ranked, self.cached_details(key).await?)))
    }

    async fn cached_details(
        &self,
        key: &LeaderboardKey,
    ) -> CacheResult<HashMap<DbId, ProgressDetail>> {
        if key.kind != ScopeKind::Challenge {
            return Ok(HashMap::new());
        }
        let raw = self.scores.hash_get_all(&key.progress_key()).await?;
        Ok(raw
            .into_iter()
            .filter_map(|(member, encoded)| {
                let user_id = parse_member(&member)?;
                let detail = serde_json::from_str(&encoded).ok()?;
                Some((user_id, detail))
            })
            .collect())
    }

    async fn finish(
        &self,
        key: &LeaderboardKey,
        page: CachedPage,
        served_from: ServedFrom,
    ) -> LeaderboardPage {
        LeaderboardPage {
            entries: self.enrich(key, page.rows, &page.details).await,
            total_members: page.total,
            served_from,
        }
    }

    // -----------------------------------------------------------------------
    // Direct path
    // -----------------------------------------------------------------------

    async fn direct(
        &self,
        key: &LeaderboardKey,
        limit: i64,
        offset: i64,
    ) -> EngineResult<LeaderboardPage> {
        let ground_truth = self.reader.ground_truth(key).await?;
        Ok(self
            .page_from_ground_truth(key, &ground_truth, limit, offset)
            .await)
    }

    async fn page_from_ground_truth(
        &self,
        key: &LeaderboardKey,
        ground_truth: &GroundTruth,
        limit: i64,
        offset: i64,
    ) -> LeaderboardPage {
        let rows = ground_truth
            .standings
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .enumerate()
            .map(|(index, (user_id, score))| Ranked {
                user_id: *user_id,
                score: score.value(),
                rank: rank_at(offset, index),
            })
            .collect();

        LeaderboardPage {
            entries: self.enrich(key, rows, &ground_truth.details).await,
            total_members: ground_truth.len() as i64,
            served_from: ServedFrom::Direct,
        }
    }

    async fn standing_from_ground_truth(
        &self,
        key: &LeaderboardKey,
        ground_truth: &GroundTruth,
        user_id: DbId,
    ) -> Option<LeaderboardEntry> {
        let (rank, score) = ground_truth.standing_of(user_id)?;
        let ranked = Ranked {
            user_id,
            score: score.value(),
            rank,
        };
        self.enrich(key, vec![ranked], &ground_truth.details).await.pop()
    }

    // -----------------------------------------------------------------------
    // Enrichment
    // -----------------------------------------------------------------------

    async fn enrich(
        &self,
        key: &LeaderboardKey,
        rows: Vec<Ranked>,
        details: &HashMap<DbId, ProgressDetail>,
    ) -> Vec<LeaderboardEntry> {
        let ids: Vec<DbId> = rows.iter().map(|r| r.user_id).collect();
        let profiles: HashMap<_, _> = if ids.is_empty() {
            HashMap::new()
        } else {
            match self.source.profiles(&ids).await {
                Ok(profiles) => profiles.into_iter().map(|p| (p.id, p)).collect(),
                Err(e) => {
                    tracing::warn!(
                        key = %key,
                        error = %e,
                        "Profile lookup failed, using placeholders",
                    );
                    HashMap::new()
                }
            }
        };

        let is_challenge = key.kind == ScopeKind::Challenge;
        rows.into_iter()
            .map(|row| {
                let profile = profiles.get(&row.user_id);
                let detail = details.get(&row.user_id).filter(|_| is_challenge);
                LeaderboardEntry {
                    user_id: row.user_id,
                    name: profile
                        .map_or_else(|| UNKNOWN_USER_NAME.to_string(), |p| p.name.clone()),
                    avatar_url: profile.and_then(|p| p.avatar_url.clone()),
                    score: row.score,
                    rank: row.rank,
                    progress_percentage: detail.map(|d| d.progress_percentage(row.score)),
                    completed: detail.map(|d| d.completed),
                    last_activity_date: detail.and_then(|d| d.last_activity_date),
                }
            })
            .collect()
    }
}
