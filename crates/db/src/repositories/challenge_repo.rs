//! Repository for the `challenges` table.

use sqlx::PgPool;
use stride_core::types::DbId;

use crate::models::challenge::{ChallengeRow, ChallengeWithParticipationRow};

/// Column list for `challenges` queries.
const COLUMNS: &str =
    "id, name, activity_type, unit, target_value, status, start_date, end_date";

/// Column list for `challenge_participations` queries.
pub(crate) const PARTICIPATION_COLUMNS: &str = "\
    id, challenge_id, user_id, current_value, progress_percentage, \
    completed, completed_at, joined_at, last_activity_date";

pub struct ChallengeRepo;

impl ChallengeRepo {
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<ChallengeRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM challenges WHERE id = $1");
        sqlx::query_as::<_, ChallengeRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// A user's participations in challenges whose status is `active`,
    /// joined with the challenge row. Window and type filters are applied
    /// by the caller.
    pub async fn active_for_user(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Vec<ChallengeWithParticipationRow>, sqlx::Error> {
        sqlx::query_as::<_, ChallengeWithParticipationRow>(
            "SELECT c.id, c.name, c.activity_type, c.unit, c.target_value, c.status, \
                    c.start_date, c.end_date, \
                    p.id AS participation_id, p.user_id, p.current_value, \
                    p.progress_percentage, p.completed, p.completed_at, p.joined_at, \
                    p.last_activity_date \
             FROM challenge_participations p \
             JOIN challenges c ON c.id = p.challenge_id \
             WHERE p.user_id = $1 AND c.status = 'active' \
             ORDER BY c.id",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }
}
