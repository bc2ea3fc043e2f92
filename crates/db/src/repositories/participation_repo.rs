//! Repository for the `challenge_participations` table.
//!
//! Progress application is a read-modify-write under a row lock
//! (`SELECT ... FOR UPDATE`) so concurrent activities for the same
//! participation serialize instead of overwriting each other. The
//! `challenge_progress_applications` table makes it idempotent per
//! activity id.

use sqlx::PgPool;
use stride_core::challenge::{apply_progress, ChallengeParticipation, ProgressApplication};
use stride_core::types::{DbId, Timestamp};

use crate::models::challenge::ParticipationRow;
use crate::repositories::challenge_repo::PARTICIPATION_COLUMNS;

pub struct ParticipationRepo;

impl ParticipationRepo {
    /// Join a user to a challenge. Joining twice returns the existing row.
    pub async fn join(
        pool: &PgPool,
        challenge_id: DbId,
        user_id: DbId,
    ) -> Result<ParticipationRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO challenge_participations (challenge_id, user_id) VALUES ($1, $2) \
             ON CONFLICT (challenge_id, user_id) \
             DO UPDATE SET challenge_id = EXCLUDED.challenge_id \
             RETURNING {PARTICIPATION_COLUMNS}"
        );
        sqlx::query_as::<_, ParticipationRow>(&query)
            .bind(challenge_id)
            .bind(user_id)
            .fetch_one(pool)
            .await
    }

    /// Every participation in a challenge together with the ids of the
    /// activities already applied to them, read from one snapshot.
    pub async fn standings(
        pool: &PgPool,
        challenge_id: DbId,
    ) -> Result<(Vec<ParticipationRow>, Vec<DbId>), sqlx::Error> {
        let mut tx = pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await?;

        let query = format!(
            "SELECT {PARTICIPATION_COLUMNS} FROM challenge_participations \
             WHERE challenge_id = $1 ORDER BY user_id"
        );
        let participations = sqlx::query_as::<_, ParticipationRow>(&query)
            .bind(challenge_id)
            .fetch_all(&mut *tx)
            .await?;

        let applied = sqlx::query_scalar::<_, DbId>(
            "SELECT a.activity_id FROM challenge_progress_applications a \
             JOIN challenge_participations p ON p.id = a.participation_id \
             WHERE p.challenge_id = $1 ORDER BY a.activity_id",
        )
        .bind(challenge_id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((participations, applied))
    }

    /// Apply one activity's progress `delta` to a participation.
    ///
    /// Returns `Ok(None)` when the participation does not exist.
    pub async fn apply_progress(
        pool: &PgPool,
        participation_id: DbId,
        activity_id: DbId,
        delta: f64,
        target_value: f64,
        now: Timestamp,
    ) -> Result<Option<ProgressApplication>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "SELECT {PARTICIPATION_COLUMNS} FROM challenge_participations \
             WHERE id = $1 FOR UPDATE"
        );
        let Some(row) = sqlx::query_as::<_, ParticipationRow>(&query)
            .bind(participation_id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            tx.rollback().await?;
            return Ok(None);
        };
        let current = ChallengeParticipation::from(row);

        let inserted = sqlx::query(
            "INSERT INTO challenge_progress_applications (participation_id, activity_id, delta) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (participation_id, activity_id) DO NOTHING",
        )
        .bind(participation_id)
        .bind(activity_id)
        .bind(delta)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if inserted == 0 {
            tx.commit().await?;
            return Ok(Some(ProgressApplication::AlreadyApplied(current)));
        }

        let mut change = apply_progress(&current, delta, target_value, now);
        let next = &change.participation;

        let query = format!(
            "UPDATE challenge_participations SET \
                current_value = $2, progress_percentage = $3, completed = $4, \
                completed_at = $5, last_activity_date = $6, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {PARTICIPATION_COLUMNS}"
        );
        let stored = sqlx::query_as::<_, ParticipationRow>(&query)
            .bind(participation_id)
            .bind(next.current_value)
            .bind(next.progress_percentage)
            .bind(next.completed)
            .bind(next.completed_at)
            .bind(next.last_activity_date)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        change.participation = stored.into();
        Ok(Some(ProgressApplication::Applied(change)))
    }
}
