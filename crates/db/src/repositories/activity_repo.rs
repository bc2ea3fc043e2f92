//! Repository for the `activities` table.

use sqlx::PgPool;
use stride_core::activity::NewActivity;
use stride_core::types::DbId;

use crate::models::activity::ActivityRow;

/// Column list for `activities` queries.
const COLUMNS: &str = "id, user_id, activity_type, value, unit, recorded_at, created_at";

pub struct ActivityRepo;

impl ActivityRepo {
    /// Insert a validated activity and return the stored row.
    pub async fn create(pool: &PgPool, input: &NewActivity) -> Result<ActivityRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO activities (user_id, activity_type, value, unit, recorded_at) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ActivityRow>(&query)
            .bind(input.user_id)
            .bind(&input.activity_type)
            .bind(input.value)
            .bind(&input.unit)
            .bind(input.recorded_at)
            .fetch_one(pool)
            .await
    }

    /// All activities authored by `user_ids`, optionally restricted to one
    /// canonical activity type. Ordered by id for reproducible folds.
    pub async fn list_for_users(
        pool: &PgPool,
        user_ids: &[DbId],
        activity_type: Option<&str>,
    ) -> Result<Vec<ActivityRow>, sqlx::Error> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = format!(
            "SELECT {COLUMNS} FROM activities \
             WHERE user_id = ANY($1) \
               AND ($2::TEXT IS NULL OR activity_type = $2) \
             ORDER BY id"
        );
        sqlx::query_as::<_, ActivityRow>(&query)
            .bind(user_ids)
            .bind(activity_type)
            .fetch_all(pool)
            .await
    }
}
