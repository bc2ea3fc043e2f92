//! Source-of-Truth Reader: computes standings directly from the
//! authoritative store. Pure folds over what the store returns; nothing
//! here touches the cache.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use stride_core::challenge::{progress_percentage, Challenge, ChallengeParticipation};
use stride_core::conversion::RateScope;
use stride_core::error::CoreError;
use stride_core::leaderboard::{
    sort_standings, Dimension, GroundTruthScore, LeaderboardKey, ScopeKind,
};
use stride_core::types::{DbId, Timestamp};

use crate::error::EngineResult;
use crate::source::{ChallengeStandings, SourceStore};

/// Challenge-only detail stored next to a participant's score.
///
/// The percentage is not stored: it is derived from the score it sits
/// next to, so a detail written once stays correct while the score moves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressDetail {
    pub target_value: f64,
    pub completed: bool,
    pub last_activity_date: Option<Timestamp>,
}

impl ProgressDetail {
    pub fn new(p: &ChallengeParticipation, target_value: f64) -> Self {
        Self {
            target_value,
            completed: p.completed,
            last_activity_date: p.last_activity_date,
        }
    }

    pub fn progress_percentage(&self, current_value: f64) -> f64 {
        progress_percentage(current_value, self.target_value)
    }
}

/// The authoritative standings of one leaderboard key.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GroundTruth {
    /// Every member, in standing order.
    pub standings: Vec<(DbId, GroundTruthScore)>,
    /// Progress details per user; empty for club leaderboards.
    pub details: HashMap<DbId, ProgressDetail>,
    /// Every activity whose contribution is already in `standings`.
    pub applied_activity_ids: Vec<DbId>,
}

impl GroundTruth {
    pub fn len(&self) -> usize {
        self.standings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.standings.is_empty()
    }

    /// 1-based rank and score of one user.
    pub fn standing_of(&self, user_id: DbId) -> Option<(i64, GroundTruthScore)> {
        self.standings
            .iter()
            .position(|(id, _)| *id == user_id)
            .map(|index| (index as i64 + 1, self.standings[index].1))
    }
}

#[derive(Clone)]
pub struct SourceReader {
    source: Arc<dyn SourceStore>,
}

impl SourceReader {
    pub fn new(source: Arc<dyn SourceStore>) -> Self {
        Self { source }
    }

    /// Ground truth for any leaderboard key.
    pub async fn ground_truth(&self, key: &LeaderboardKey) -> EngineResult<GroundTruth> {
        match key.kind {
            ScopeKind::Club => self.compute_club_scores(key.scope_id, &key.dimension).await,
            ScopeKind::Challenge => {
                let (challenge, standings) = self.compute_challenge_progress(key.scope_id).await?;
                Ok(challenge_ground_truth(&challenge, standings))
            }
        }
    }

    /// Sum converted points per club member. Members without a qualifying
    /// activity score zero.
    pub async fn compute_club_scores(
        &self,
        club_id: DbId,
        dimension: &Dimension,
    ) -> EngineResult<GroundTruth> {
        let members = self.source.club_member_ids(club_id).await?;
        if members.is_empty() {
            return Ok(GroundTruth::default());
        }

        let activities = self
            .source
            .activities_for_users(&members, dimension.activity_type())
            .await?;
        let rates = self.source.rate_table(RateScope::Club(club_id)).await?;

        let mut totals: HashMap<DbId, GroundTruthScore> = members
            .iter()
            .map(|id| (*id, GroundTruthScore::default()))
            .collect();
        let mut applied_activity_ids = Vec::new();
        for activity in activities.iter().filter(|a| dimension.admits(&a.activity_type)) {
            if let Some(total) = totals.get_mut(&activity.user_id) {
                *total = total.add(rates.points_for(
                    &activity.activity_type,
                    activity.value,
                    &activity.unit,
                ));
                applied_activity_ids.push(activity.id);
            }
        }

        let mut standings: Vec<_> = totals.into_iter().collect();
        sort_standings(&mut standings);
        tracing::debug!(club_id, members = standings.len(), "Computed club standings");
        Ok(GroundTruth {
            standings,
            details: HashMap::new(),
            applied_activity_ids,
        })
    }

    /// Load a challenge and its participations verbatim.
    pub async fn compute_challenge_progress(
        &self,
        challenge_id: DbId,
    ) -> EngineResult<(Challenge, ChallengeStandings)> {
        let challenge = self
            .source
            .challenge(challenge_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "Challenge",
                id: challenge_id,
            })?;
        let standings = self.source.challenge_standings(challenge_id).await?;
        Ok((challenge, standings))
    }
}

/// Challenge standings rank participants by `current_value`.
fn challenge_ground_truth(challenge: &Challenge, source: ChallengeStandings) -> GroundTruth {
    let mut standings: Vec<_> = source
        .participations
        .iter()
        .map(|p| (p.user_id, GroundTruthScore::from_source(p.current_value)))
        .collect();
    sort_standings(&mut standings);
    GroundTruth {
        standings,
        details: source
            .participations
            .iter()
            .map(|p| (p.user_id, ProgressDetail::new(p, challenge.target_value)))
            .collect(),
        applied_activity_ids: source.applied_activity_ids,
    }
}
