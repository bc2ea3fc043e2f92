//! Repository for the `club_members` table.

use sqlx::PgPool;
use stride_core::types::DbId;

use crate::models::club::ClubMember;

/// Column list for `club_members` queries.
const COLUMNS: &str = "id, club_id, user_id, joined_at";

pub struct ClubMemberRepo;

impl ClubMemberRepo {
    /// Add a user to a club. Re-adding an existing member returns the
    /// existing row.
    pub async fn add(
        pool: &PgPool,
        club_id: DbId,
        user_id: DbId,
    ) -> Result<ClubMember, sqlx::Error> {
        let query = format!(
            "INSERT INTO club_members (club_id, user_id) VALUES ($1, $2) \
             ON CONFLICT (club_id, user_id) DO UPDATE SET club_id = EXCLUDED.club_id \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ClubMember>(&query)
            .bind(club_id)
            .bind(user_id)
            .fetch_one(pool)
            .await
    }

    /// User ids of every member of a club.
    pub async fn member_user_ids(pool: &PgPool, club_id: DbId) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar::<_, DbId>(
            "SELECT user_id FROM club_members WHERE club_id = $1 ORDER BY user_id",
        )
        .bind(club_id)
        .fetch_all(pool)
        .await
    }

    /// Ids of every club a user belongs to.
    pub async fn club_ids_for_user(pool: &PgPool, user_id: DbId) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar::<_, DbId>(
            "SELECT club_id FROM club_members WHERE user_id = $1 ORDER BY club_id",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }
}
