//! Incremental Update Path.
//!
//! Applies one recorded activity to every leaderboard it touches without a
//! full rebuild. Nothing here fails the caller: each club and challenge is
//! handled independently and its result is reported in an [`UpdateReport`].
//!
//! Keys are only incremented when warm. A cold key is left for the next
//! read to rebuild, which will already include the activity. Each
//! increment first claims the activity id in the key's applied set, which
//! rebuilds also populate, so neither redelivery nor an increment racing a
//! rebuild counts an activity twice.
//!
//! Challenge progress is persisted in the source of truth first; a
//! detached [`MirrorTask`] then adds the same delta to warm challenge keys.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use stride_cache::{CacheError, ScoreStore};
use stride_core::activity::Activity;
use stride_core::challenge::{
    check_eligibility, Challenge, ChallengeParticipation, Ineligible, ProgressApplication,
    UnitPolicy,
};
use stride_core::conversion::RateScope;
use stride_core::leaderboard::{member_key, Dimension, LeaderboardKey};
use stride_core::types::{DbId, Timestamp};
use tokio::task::JoinHandle;

use crate::reader::ProgressDetail;
use crate::source::SourceStore;

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

/// Result of touching one cache key.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum KeyOutcome {
    Incremented { score: f64 },
    /// Key was cold; the next read rebuilds it.
    SkippedCold,
    /// This activity was already applied to the key.
    AlreadyApplied,
    CacheUnavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyUpdate {
    pub key: String,
    #[serde(flatten)]
    pub outcome: KeyOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ClubUpdate {
    /// The activity is worth zero points in this club.
    NoPoints { club_id: DbId },
    Updated {
        club_id: DbId,
        points: f64,
        keys: Vec<KeyUpdate>,
    },
    Failed { club_id: DbId, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChallengeUpdate {
    Skipped {
        challenge_id: DbId,
        reason: Ineligible,
    },
    Applied {
        challenge_id: DbId,
        current_value: f64,
        progress_percentage: f64,
        completed: bool,
        newly_completed: bool,
    },
    AlreadyApplied { challenge_id: DbId },
    Failed { challenge_id: DbId, reason: String },
}

/// Everything the incremental path did for one activity.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UpdateReport {
    pub activity_id: DbId,
    pub clubs: Vec<ClubUpdate>,
    pub challenges: Vec<ChallengeUpdate>,
    /// Lookups that failed before any club or challenge could be handled.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Handle to the detached cache mirror of challenge progress.
///
/// Dropping it leaves the task running.
#[derive(Debug, Default)]
pub struct MirrorTask(Option<JoinHandle<()>>);

impl MirrorTask {
    /// Wait for the mirror to finish.
    pub async fn wait(self) {
        if let Some(handle) = self.0 {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Challenge cache mirror task failed");
            }
        }
    }
}

#[derive(Debug)]
pub struct ActivityUpdate {
    pub report: UpdateReport,
    pub mirror: MirrorTask,
}

// ---------------------------------------------------------------------------
// Updater
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct IncrementalUpdater {
    source: Arc<dyn SourceStore>,
    scores: Arc<dyn ScoreStore>,
    ttl: Duration,
    unit_policy: UnitPolicy,
}

impl IncrementalUpdater {
    pub fn new(
        source: Arc<dyn SourceStore>,
        scores: Arc<dyn ScoreStore>,
        ttl: Duration,
        unit_policy: UnitPolicy,
    ) -> Self {
        Self {
            source,
            scores,
            ttl,
            unit_policy,
        }
    }

    /// Look up the author's clubs and active challenges, then apply.
    pub async fn on_activity_recorded(&self, activity: &Activity) -> ActivityUpdate {
        let mut warnings = Vec::new();

        let clubs = match self.source.club_ids_for_user(activity.user_id).await {
            Ok(clubs) => clubs,
            Err(e) => {
                tracing::warn!(user_id = activity.user_id, error = %e, "Club lookup failed");
                warnings.push(format!("club lookup failed: {e}"));
                Vec::new()
            }
        };
        let participations = match self
            .source
            .active_participations_for_user(activity.user_id)
            .await
        {
            Ok(participations) => participations,
            Err(e) => {
                tracing::warn!(user_id = activity.user_id, error = %e, "Challenge lookup failed");
                warnings.push(format!("challenge lookup failed: {e}"));
                Vec::new()
            }
        };

        let mut update = self
            .apply_activity(activity, &clubs, &participations, Utc::now())
            .await;
        update.report.warnings = warnings;
        update
    }

    async fn apply_activity(
        &self,
        activity: &Activity,
        clubs: &[DbId],
        participations: &[(Challenge, ChallengeParticipation)],
        now: Timestamp,
    ) -> ActivityUpdate {
        let club_updates = join_all(
            clubs
                .iter()
                .map(|club_id| self.update_club(activity, *club_id)),
        )
        .await;
        let challenge_results = join_all(participations.iter().map(|(challenge, participation)| {
            self.update_challenge(activity, challenge, participation, now)
        }))
        .await;

        let mut challenges = Vec::with_capacity(challenge_results.len());
        let mut mirrors = Vec::new();
        for (update, mirror) in challenge_results {
            challenges.push(update);
            mirrors.extend(mirror);
        }

        tracing::debug!(
            activity_id = activity.id,
            clubs = club_updates.len(),
            challenges = challenges.len(),
            "Applied activity to leaderboards",
        );

        ActivityUpdate {
            report: UpdateReport {
                activity_id: activity.id,
                clubs: club_updates,
                challenges,
                warnings: Vec::new(),
            },
            mirror: self.spawn_mirror(mirrors),
        }
    }

    // -----------------------------------------------------------------------
    // Clubs
    // -----------------------------------------------------------------------

    async fn update_club(&self, activity: &Activity, club_id: DbId) -> ClubUpdate {
        let rates = match self.source.rate_table(RateScope::Club(club_id)).await {
            Ok(rates) => rates,
            Err(e) => {
                tracing::warn!(
                    club_id,
                    activity_id = activity.id,
                    error = %e,
                    "Rate lookup failed",
                );
                return ClubUpdate::Failed {
                    club_id,
                    reason: e.to_string(),
                };
            }
        };
        let points = rates.points_for(&activity.activity_type, activity.value, &activity.unit);
        if points == 0.0 {
            return ClubUpdate::NoPoints { club_id };
        }

        let mut targets = vec![LeaderboardKey::club(
            club_id,
            Dimension::from_filter(Some(&activity.activity_type)),
        )];
        if targets[0].dimension != Dimension::All {
            targets.push(LeaderboardKey::club(club_id, Dimension::All));
        }
        let member = &member_key(activity.user_id);

        let keys = join_all(targets.iter().map(|key| async move {
            let applied =
                apply_once(self.scores.as_ref(), key, member, activity.id, points, self.ttl).await;
            let outcome = match applied {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Incremental update skipped");
                    KeyOutcome::CacheUnavailable
                }
            };
            KeyUpdate {
                key: key.cache_key(),
                outcome,
            }
        }))
        .await;

        ClubUpdate::Updated {
            club_id,
            points,
            keys,
        }
    }

    // -----------------------------------------------------------------------
    // Challenges
    // -----------------------------------------------------------------------

    async fn update_challenge(
        &self,
        activity: &Activity,
        challenge: &Challenge,
        participation: &ChallengeParticipation,
        now: Timestamp,
    ) -> (ChallengeUpdate, Option<MirrorJob>) {
        let challenge_id = challenge.id;
        let delta = match check_eligibility(challenge, activity, now, self.unit_policy) {
            Ok(delta) => delta,
            Err(reason) => return (ChallengeUpdate::Skipped { challenge_id, reason }, None),
        };

        let applied = self
            .source
            .apply_challenge_progress(
                participation.id,
                activity.id,
                delta,
                challenge.target_value,
                now,
            )
            .await;

        match applied {
            Ok(ProgressApplication::Applied(change)) => {
                let p = &change.participation;
                if change.newly_completed {
                    tracing::info!(challenge_id, user_id = p.user_id, "Challenge completed");
                }
                let update = ChallengeUpdate::Applied {
                    challenge_id,
                    current_value: p.current_value,
                    progress_percentage: p.progress_percentage,
                    completed: p.completed,
                    newly_completed: change.newly_completed,
                };
                let job = MirrorJob {
                    challenge_id,
                    user_id: p.user_id,
                    activity_id: activity.id,
                    delta,
                    detail: ProgressDetail::new(p, challenge.target_value),
                };
                (update, Some(job))
            }
            // The first application already mirrored this activity.
            Ok(ProgressApplication::AlreadyApplied(_)) => {
                (ChallengeUpdate::AlreadyApplied { challenge_id }, None)
            }
            Err(e) => {
                tracing::error!(
                    challenge_id,
                    participation_id = participation.id,
                    activity_id = activity.id,
                    error = %e,
                    "Challenge progress update failed",
                );
                (
                    ChallengeUpdate::Failed {
                        challenge_id,
                        reason: e.to_string(),
                    },
                    None,
                )
            }
        }
    }

    /// Apply persisted progress deltas to warm challenge keys in the
    /// background.
    fn spawn_mirror(&self, jobs: Vec<MirrorJob>) -> MirrorTask {
        if jobs.is_empty() {
            return MirrorTask::default();
        }
        let scores = Arc::clone(&self.scores);
        let ttl = self.ttl;
        MirrorTask(Some(tokio::spawn(async move {
            for job in jobs {
                let key = LeaderboardKey::challenge(job.challenge_id);
                match mirror_progress(scores.as_ref(), &key, &job, ttl).await {
                    Ok(outcome) => {
                        tracing::debug!(key = %key, ?outcome, "Challenge progress mirrored");
                    }
                    Err(e) => {
                        tracing::debug!(key = %key, error = %e, "Challenge cache mirror skipped");
                    }
                }
            }
        })))
    }
}

/// One persisted progress change to copy into the challenge key.
#[derive(Debug, Clone)]
struct MirrorJob {
    challenge_id: DbId,
    user_id: DbId,
    activity_id: DbId,
    delta: f64,
    detail: ProgressDetail,
}

/// Add `delta` to `member` under a warm `key` unless `activity_id` is
/// already in the key's applied set.
async fn apply_once(
    scores: &dyn ScoreStore,
    key: &LeaderboardKey,
    member: &str,
    activity_id: DbId,
    delta: f64,
    ttl: Duration,
) -> Result<KeyOutcome, CacheError> {
    let cache_key = key.cache_key();
    if !scores.exists(&cache_key).await? {
        return Ok(KeyOutcome::SkippedCold);
    }

    let applied_key = key.applied_key();
    if !scores
        .claim_member(&applied_key, &activity_id.to_string(), ttl)
        .await?
    {
        return Ok(KeyOutcome::AlreadyApplied);
    }

    match scores.increment(&cache_key, member, delta).await {
        Ok(score) => {
            scores.expire(&cache_key, ttl).await?;
            Ok(KeyOutcome::Incremented {
                score: score.value(),
            })
        }
        Err(e) => {
            // Release the claim so a retry can apply it.
            if let Err(release) = scores
                .release_member(&applied_key, &activity_id.to_string())
                .await
            {
                tracing::warn!(
                    key = %applied_key,
                    activity_id,
                    error = %release,
                    "Could not release applied marker",
                );
            }
            Err(e)
        }
    }
}

/// Increment the participant's score by the job's delta, then record the
/// detail. Completion never reverts, so a completed detail overwrites;
/// anything else only fills in a participant the key has not seen yet.
async fn mirror_progress(
    scores: &dyn ScoreStore,
    key: &LeaderboardKey,
    job: &MirrorJob,
    ttl: Duration,
) -> Result<KeyOutcome, CacheError> {
    let member = member_key(job.user_id);
    let outcome = apply_once(scores, key, &member, job.activity_id, job.delta, ttl).await?;
    if !matches!(outcome, KeyOutcome::Incremented { .. }) {
        return Ok(outcome);
    }

    let Ok(encoded) = serde_json::to_string(&job.detail) else {
        return Ok(outcome);
    };
    let progress_key = key.progress_key();
    if job.detail.completed {
        scores.hash_set(&progress_key, &member, &encoded).await?;
    } else {
        scores
            .hash_set_if_absent(&progress_key, &member, &encoded)
            .await?;
    }
    scores.expire(&progress_key, ttl).await?;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use stride_cache::MemoryScoreStore;

    use super::*;

    #[tokio::test]
    async fn failed_increment_releases_the_claim() {
        let scores = MemoryScoreStore::new();
        let key = LeaderboardKey::club(3, Dimension::All);
        let ttl = Duration::from_secs(60);
        // A hash under the score key makes the increment fail.
        scores.hash_set(&key.cache_key(), "x", "y").await.unwrap();

        let outcome = apply_once(&scores, &key, &member_key(1), 42, 5.0, ttl).await;
        assert!(outcome.is_err());
        assert!(scores.claim_member(&key.applied_key(), "42", ttl).await.unwrap());
    }

    #[tokio::test]
    async fn cold_key_is_not_claimed() {
        let scores = MemoryScoreStore::new();
        let key = LeaderboardKey::club(3, Dimension::All);
        let ttl = Duration::from_secs(60);

        let outcome = apply_once(&scores, &key, &member_key(1), 42, 5.0, ttl).await;
        assert!(matches!(outcome, Ok(KeyOutcome::SkippedCold)));
        assert!(!scores.exists(&key.applied_key()).await.unwrap());
    }
}
