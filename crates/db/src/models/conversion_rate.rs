//! Conversion rate model.

use sqlx::FromRow;
use stride_core::conversion::ConversionRate;
use stride_core::types::DbId;

/// A row from the `conversion_rates` table.
#[derive(Debug, Clone, FromRow)]
pub struct ConversionRateRow {
    pub id: DbId,
    pub scope_kind: String,
    pub scope_id: Option<DbId>,
    pub activity_type: String,
    pub unit: String,
    pub rate: f64,
}

impl From<ConversionRateRow> for ConversionRate {
    fn from(row: ConversionRateRow) -> Self {
        ConversionRate::new(&row.activity_type, &row.unit, row.rate)
    }
}
