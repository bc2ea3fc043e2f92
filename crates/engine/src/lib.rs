//! Leaderboard and challenge progress engine.
//!
//! [`LeaderboardEngine`] wires the components together over a
//! [`SourceStore`] (authoritative data) and a [`ScoreStore`] (disposable
//! ranked cache):
//!
//! - [`reader`]: ground truth computed from source;
//! - [`rebuild`]: reconstructs one cache key from ground truth;
//! - [`query`]: cache-aside reads with lazy rebuild and direct fallback;
//! - [`incremental`]: per-activity deltas and challenge progress.

use std::sync::Arc;

use stride_cache::ScoreStore;
use stride_core::activity::{Activity, NewActivity};
use stride_core::leaderboard::{LeaderboardEntry, LeaderboardKey, LeaderboardPage};
use stride_core::types::DbId;

pub mod config;
pub mod error;
pub mod incremental;
pub mod query;
pub mod reader;
pub mod rebuild;
pub mod source;

pub use config::EngineConfig;
pub use error::{EngineError, EngineResult, SourceError, SourceResult};
pub use incremental::{ActivityUpdate, IncrementalUpdater, MirrorTask, UpdateReport};
pub use query::{LeaderboardQuery, LeaderboardService};
pub use reader::{GroundTruth, SourceReader};
pub use rebuild::{RebuildOrchestrator, RebuildOutcome};
pub use source::{ChallengeStandings, MemorySourceStore, PgSourceStore, SourceStore};

#[derive(Clone)]
pub struct LeaderboardEngine {
    source: Arc<dyn SourceStore>,
    scores: Arc<dyn ScoreStore>,
    rebuilder: RebuildOrchestrator,
    service: LeaderboardService,
    updater: IncrementalUpdater,
}

impl LeaderboardEngine {
    pub fn new(
        source: Arc<dyn SourceStore>,
        scores: Arc<dyn ScoreStore>,
        config: EngineConfig,
    ) -> Self {
        let reader = SourceReader::new(Arc::clone(&source));
        let rebuilder =
            RebuildOrchestrator::new(reader.clone(), Arc::clone(&scores), config.cache_ttl);
        let service = LeaderboardService::new(
            Arc::clone(&source),
            Arc::clone(&scores),
            reader,
            rebuilder.clone(),
        );
        let updater = IncrementalUpdater::new(
            Arc::clone(&source),
            Arc::clone(&scores),
            config.cache_ttl,
            config.unit_policy,
        );
        Self {
            source,
            scores,
            rebuilder,
            service,
            updater,
        }
    }

    pub fn source(&self) -> &Arc<dyn SourceStore> {
        &self.source
    }

    pub fn scores(&self) -> &Arc<dyn ScoreStore> {
        &self.scores
    }

    pub async fn get_leaderboard(&self, query: LeaderboardQuery) -> EngineResult<LeaderboardPage> {
        self.service.get_leaderboard(query).await
    }

    pub async fn member_standing(
        &self,
        key: &LeaderboardKey,
        user_id: DbId,
    ) -> EngineResult<Option<LeaderboardEntry>> {
        self.service.member_standing(key, user_id).await
    }

    pub async fn rebuild(&self, key: &LeaderboardKey) -> EngineResult<RebuildOutcome> {
        self.rebuilder.rebuild(key).await
    }

    pub async fn on_activity_recorded(&self, activity: &Activity) -> ActivityUpdate {
        self.updater.on_activity_recorded(activity).await
    }

    /// Durably write an activity, then run the incremental path.
    ///
    /// Only the write can fail; leaderboard side effects are reported in
    /// the returned [`ActivityUpdate`].
    pub async fn record_activity(
        &self,
        activity: NewActivity,
    ) -> EngineResult<(Activity, ActivityUpdate)> {
        let activity = self.source.insert_activity(activity).await?;
        tracing::info!(
            activity_id = activity.id,
            user_id = activity.user_id,
            activity_type = %activity.activity_type,
            "Activity recorded",
        );
        let update = self.updater.on_activity_recorded(&activity).await;
        Ok((activity, update))
    }
}
