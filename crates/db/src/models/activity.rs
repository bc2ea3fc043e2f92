//! Activity entity model.

use serde::Serialize;
use sqlx::FromRow;
use stride_core::activity::Activity;
use stride_core::types::{DbId, Timestamp};

/// A row from the `activities` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ActivityRow {
    pub id: DbId,
    pub user_id: DbId,
    pub activity_type: String,
    pub value: f64,
    pub unit: String,
    pub recorded_at: Timestamp,
    pub created_at: Timestamp,
}

impl From<ActivityRow> for Activity {
    fn from(row: ActivityRow) -> Self {
        Activity {
            id: row.id,
            user_id: row.user_id,
            activity_type: row.activity_type,
            value: row.value,
            unit: row.unit,
            recorded_at: row.recorded_at,
        }
    }
}
