//! Postgres-backed [`SourceStore`] built on the `stride-db` repositories.

use async_trait::async_trait;
use sqlx::PgPool;
use stride_core::activity::{Activity, NewActivity, Profile};
use stride_core::challenge::{Challenge, ChallengeParticipation, ProgressApplication};
use stride_core::conversion::{ConversionRate, RateScope, RateTable};
use stride_core::types::{DbId, Timestamp};
use stride_db::repositories::{
    ActivityRepo, ChallengeRepo, ClubMemberRepo, ConversionRateRepo, ParticipationRepo,
    ProfileRepo,
};

use crate::error::{SourceError, SourceResult};
use crate::source::{ChallengeStandings, SourceStore};

/// SQLSTATE codes worth retrying: serialization failure, deadlock.
const RETRYABLE_SQLSTATES: [&str; 2] = ["40001", "40P01"];

pub struct PgSourceStore {
    pool: PgPool,
    progress_max_attempts: u32,
}

impl PgSourceStore {
    pub fn new(pool: PgPool, progress_max_attempts: u32) -> Self {
        Self {
            pool,
            progress_max_attempts: progress_max_attempts.max(1),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn is_retryable(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err
            .code()
            .is_some_and(|code| RETRYABLE_SQLSTATES.contains(&code.as_ref())),
        _ => false,
    }
}

#[async_trait]
impl SourceStore for PgSourceStore {
    async fn ping(&self) -> SourceResult<()> {
        stride_db::health_check(&self.pool)
            .await
            .map_err(SourceError::query)
    }

    async fn club_member_ids(&self, club_id: DbId) -> SourceResult<Vec<DbId>> {
        ClubMemberRepo::member_user_ids(&self.pool, club_id)
            .await
            .map_err(SourceError::query)
    }

    async fn club_ids_for_user(&self, user_id: DbId) -> SourceResult<Vec<DbId>> {
        ClubMemberRepo::club_ids_for_user(&self.pool, user_id)
            .await
            .map_err(SourceError::query)
    }

    async fn activities_for_users(
        &self,
        user_ids: &[DbId],
        activity_type: Option<&str>,
    ) -> SourceResult<Vec<Activity>> {
        let rows = ActivityRepo::list_for_users(&self.pool, user_ids, activity_type)
            .await
            .map_err(SourceError::query)?;
        Ok(rows.into_iter().map(Activity::from).collect())
    }

    async fn rate_table(&self, scope: RateScope) -> SourceResult<RateTable> {
        let overrides = match scope {
            RateScope::Global => Vec::new(),
            scoped => ConversionRateRepo::list_for_scope(&self.pool, scoped)
                .await
                .map_err(SourceError::query)?,
        };
        let defaults = ConversionRateRepo::list_for_scope(&self.pool, RateScope::Global)
            .await
            .map_err(SourceError::query)?;
        Ok(RateTable::new(
            overrides.into_iter().map(ConversionRate::from).collect(),
            defaults.into_iter().map(ConversionRate::from).collect(),
        ))
    }

    async fn profiles(&self, user_ids: &[DbId]) -> SourceResult<Vec<Profile>> {
        let rows = ProfileRepo::find_many(&self.pool, user_ids)
            .await
            .map_err(SourceError::query)?;
        Ok(rows.into_iter().map(Profile::from).collect())
    }

    async fn challenge(&self, challenge_id: DbId) -> SourceResult<Option<Challenge>> {
        let row = ChallengeRepo::find_by_id(&self.pool, challenge_id)
            .await
            .map_err(SourceError::query)?;
        row.map(Challenge::try_from)
            .transpose()
            .map_err(SourceError::query)
    }

    async fn challenge_standings(&self, challenge_id: DbId) -> SourceResult<ChallengeStandings> {
        let (rows, applied_activity_ids) = ParticipationRepo::standings(&self.pool, challenge_id)
            .await
            .map_err(SourceError::query)?;
        Ok(ChallengeStandings {
            participations: rows.into_iter().map(ChallengeParticipation::from).collect(),
            applied_activity_ids,
        })
    }

    async fn active_participations_for_user(
        &self,
        user_id: DbId,
    ) -> SourceResult<Vec<(Challenge, ChallengeParticipation)>> {
        let rows = ChallengeRepo::active_for_user(&self.pool, user_id)
            .await
            .map_err(SourceError::query)?;
        rows.into_iter()
            .map(|row| row.into_domain().map_err(SourceError::query))
            .collect()
    }

    async fn insert_activity(&self, activity: NewActivity) -> SourceResult<Activity> {
        let row = ActivityRepo::create(&self.pool, &activity)
            .await
            .map_err(SourceError::query)?;
        Ok(row.into())
    }

    async fn apply_challenge_progress(
        &self,
        participation_id: DbId,
        activity_id: DbId,
        delta: f64,
        target_value: f64,
        now: Timestamp,
    ) -> SourceResult<ProgressApplication> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match ParticipationRepo::apply_progress(
                &self.pool,
                participation_id,
                activity_id,
                delta,
                target_value,
                now,
            )
            .await
            {
                Ok(Some(applied)) => return Ok(applied),
                Ok(None) => {
                    return Err(SourceError::Missing {
                        entity: "ChallengeParticipation",
                        id: participation_id,
                    })
                }
                Err(e) if is_retryable(&e) && attempt < self.progress_max_attempts => {
                    tracing::debug!(
                        participation_id,
                        attempt,
                        error = %e,
                        "Retrying conflicting progress update",
                    );
                }
                Err(e) if is_retryable(&e) => {
                    tracing::warn!(
                        participation_id,
                        attempt,
                        error = %e,
                        "Progress update retries exhausted",
                    );
                    return Err(SourceError::Conflict { attempts: attempt });
                }
                Err(e) => return Err(SourceError::query(e)),
            }
        }
    }
}
