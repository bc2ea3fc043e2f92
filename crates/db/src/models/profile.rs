//! Profile entity model (display metadata only).

use sqlx::FromRow;
use stride_core::activity::Profile;
use stride_core::types::DbId;

/// A row from the `profiles` table, restricted to display columns.
#[derive(Debug, Clone, FromRow)]
pub struct ProfileRow {
    pub id: DbId,
    pub name: String,
    pub avatar_url: Option<String>,
}

impl From<ProfileRow> for Profile {
    fn from(row: ProfileRow) -> Self {
        Profile {
            id: row.id,
            name: row.name,
            avatar_url: row.avatar_url,
        }
    }
}
