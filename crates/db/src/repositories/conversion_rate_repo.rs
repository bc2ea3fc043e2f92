//! Repository for the `conversion_rates` table.

use sqlx::PgPool;
use stride_core::conversion::{ConversionRate, RateScope};

use crate::models::conversion_rate::ConversionRateRow;

/// Column list for `conversion_rates` queries.
const COLUMNS: &str = "id, scope_kind, scope_id, activity_type, unit, rate";

pub struct ConversionRateRepo;

impl ConversionRateRepo {
    /// Rates defined directly on `scope` (no fallback to global).
    pub async fn list_for_scope(
        pool: &PgPool,
        scope: RateScope,
    ) -> Result<Vec<ConversionRateRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM conversion_rates \
             WHERE scope_kind = $1 AND scope_id IS NOT DISTINCT FROM $2 \
             ORDER BY id"
        );
        sqlx::query_as::<_, ConversionRateRow>(&query)
            .bind(scope.kind_str())
            .bind(scope.scope_id())
            .fetch_all(pool)
            .await
    }

    /// Insert or replace the rate for `(scope, activity_type, unit)`.
    pub async fn upsert(
        pool: &PgPool,
        scope: RateScope,
        rate: &ConversionRate,
    ) -> Result<ConversionRateRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO conversion_rates (scope_kind, scope_id, activity_type, unit, rate) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (scope_kind, (COALESCE(scope_id, 0)), activity_type, unit) \
             DO UPDATE SET rate = EXCLUDED.rate, updated_at = NOW() \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ConversionRateRow>(&query)
            .bind(scope.kind_str())
            .bind(scope.scope_id())
            .bind(&rate.activity_type)
            .bind(&rate.unit)
            .bind(rate.rate)
            .fetch_one(pool)
            .await
    }
}
