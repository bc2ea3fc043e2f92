//! Handlers for the `/activities` resource.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use stride_core::activity::{Activity, NewActivity};
use stride_core::types::{DbId, Timestamp};
use stride_engine::{EngineError, UpdateReport};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `POST /api/v1/activities`.
#[derive(Debug, Deserialize)]
pub struct CreateActivity {
    pub user_id: DbId,
    pub activity_type: String,
    pub value: f64,
    pub unit: String,
    /// Defaults to the time of the request.
    pub recorded_at: Option<Timestamp>,
}

#[derive(Debug, Serialize)]
pub struct RecordedActivity {
    pub activity: Activity,
    pub leaderboards: UpdateReport,
}

/// POST /api/v1/activities
///
/// Persist the activity, then apply it to every affected leaderboard.
/// Returns 201 once the activity is written; leaderboard side effects are
/// best-effort and reported in the body.
pub async fn record_activity(
    State(state): State<AppState>,
    Json(input): Json<CreateActivity>,
) -> AppResult<(StatusCode, Json<DataResponse<RecordedActivity>>)> {
    let activity = NewActivity::new(
        input.user_id,
        &input.activity_type,
        input.value,
        &input.unit,
        input.recorded_at.unwrap_or_else(Utc::now),
    )?;

    let (activity, update) = state
        .engine
        .record_activity(activity)
        .await
        .map_err(|e| match e {
            EngineError::Core(core) => AppError::Core(core),
            EngineError::Source(source) => AppError::ServiceUnavailable(source.to_string()),
        })?;

    // The cache mirror keeps running after the response is sent.
    drop(update.mirror);

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: RecordedActivity {
                activity,
                leaderboards: update.report,
            },
        }),
    ))
}
