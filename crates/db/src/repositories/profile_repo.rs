//! Repository for the `profiles` table.

use sqlx::PgPool;
use stride_core::types::DbId;

use crate::models::profile::ProfileRow;

/// Column list for `profiles` display queries.
const COLUMNS: &str = "id, name, avatar_url";

pub struct ProfileRepo;

impl ProfileRepo {
    pub async fn create(
        pool: &PgPool,
        name: &str,
        avatar_url: Option<&str>,
    ) -> Result<ProfileRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO profiles (name, avatar_url) VALUES ($1, $2) RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ProfileRow>(&query)
            .bind(name)
            .bind(avatar_url)
            .fetch_one(pool)
            .await
    }

    /// Batch lookup. Ids with no row are simply absent from the result.
    pub async fn find_many(pool: &PgPool, ids: &[DbId]) -> Result<Vec<ProfileRow>, sqlx::Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = format!("SELECT {COLUMNS} FROM profiles WHERE id = ANY($1)");
        sqlx::query_as::<_, ProfileRow>(&query)
            .bind(ids)
            .fetch_all(pool)
            .await
    }
}
