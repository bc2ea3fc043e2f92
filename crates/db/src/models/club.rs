//! Club membership model.

use serde::Serialize;
use sqlx::FromRow;
use stride_core::types::{DbId, Timestamp};

/// A row from the `club_members` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ClubMember {
    pub id: DbId,
    pub club_id: DbId,
    pub user_id: DbId,
    pub joined_at: Timestamp,
}
