//! Handlers for the `/leaderboards` resource.
//!
//! Club leaderboards can be sliced by activity type; challenge leaderboards
//! always rank overall progress. A leaderboard that can be served neither
//! from the cache nor from the source of truth yields 503, never an empty
//! page.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Serialize;
use stride_core::error::CoreError;
use stride_core::leaderboard::{Dimension, LeaderboardEntry, LeaderboardKey, LeaderboardPage};
use stride_core::types::DbId;
use stride_engine::LeaderboardQuery;

use crate::error::{AppError, AppResult};
use crate::query::{ActivityTypeParams, LeaderboardParams};
use crate::response::DataResponse;
use crate::state::AppState;

/// Result of an administrative rebuild.
#[derive(Debug, Serialize)]
pub struct RebuildSummary {
    pub key: String,
    pub members: usize,
    pub cache_warmed: bool,
}

/// GET /api/v1/leaderboards/clubs/{club_id}
pub async fn club_leaderboard(
    State(state): State<AppState>,
    Path(club_id): Path<DbId>,
    Query(params): Query<LeaderboardParams>,
) -> AppResult<Json<DataResponse<LeaderboardPage>>> {
    let dimension = Dimension::from_filter(params.activity_type.as_deref());
    let key = LeaderboardKey::club(club_id, dimension);
    page(&state, key, params).await
}

/// GET /api/v1/leaderboards/challenges/{challenge_id}
pub async fn challenge_leaderboard(
    State(state): State<AppState>,
    Path(challenge_id): Path<DbId>,
    Query(params): Query<LeaderboardParams>,
) -> AppResult<Json<DataResponse<LeaderboardPage>>> {
    if params.activity_type.is_some() {
        return Err(AppError::BadRequest(
            "activity_type is not supported for challenge leaderboards".into(),
        ));
    }
    page(&state, LeaderboardKey::challenge(challenge_id), params).await
}

async fn page(
    state: &AppState,
    key: LeaderboardKey,
    params: LeaderboardParams,
) -> AppResult<Json<DataResponse<LeaderboardPage>>> {
    let query = LeaderboardQuery::new(key)
        .page(params.limit, params.offset)
        .force_rebuild(params.rebuild);
    let page = state.engine.get_leaderboard(query).await?;
    Ok(Json(DataResponse { data: page }))
}

/// GET /api/v1/leaderboards/clubs/{club_id}/members/{user_id}
pub async fn club_member_standing(
    State(state): State<AppState>,
    Path((club_id, user_id)): Path<(DbId, DbId)>,
    Query(params): Query<ActivityTypeParams>,
) -> AppResult<Json<DataResponse<LeaderboardEntry>>> {
    let dimension = Dimension::from_filter(params.activity_type.as_deref());
    let key = LeaderboardKey::club(club_id, dimension);
    standing(&state, key, user_id).await
}

/// GET /api/v1/leaderboards/challenges/{challenge_id}/members/{user_id}
pub async fn challenge_member_standing(
    State(state): State<AppState>,
    Path((challenge_id, user_id)): Path<(DbId, DbId)>,
) -> AppResult<Json<DataResponse<LeaderboardEntry>>> {
    standing(&state, LeaderboardKey::challenge(challenge_id), user_id).await
}

async fn standing(
    state: &AppState,
    key: LeaderboardKey,
    user_id: DbId,
) -> AppResult<Json<DataResponse<LeaderboardEntry>>> {
    let entry = state
        .engine
        .member_standing(&key, user_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "LeaderboardMember",
            id: user_id,
        })?;
    Ok(Json(DataResponse { data: entry }))
}

/// POST /api/v1/leaderboards/clubs/{club_id}/rebuild
pub async fn rebuild_club(
    State(state): State<AppState>,
    Path(club_id): Path<DbId>,
    Query(params): Query<ActivityTypeParams>,
) -> AppResult<Json<DataResponse<RebuildSummary>>> {
    let dimension = Dimension::from_filter(params.activity_type.as_deref());
    let key = LeaderboardKey::club(club_id, dimension);
    rebuild(&state, key).await
}

/// POST /api/v1/leaderboards/challenges/{challenge_id}/rebuild
pub async fn rebuild_challenge(
    State(state): State<AppState>,
    Path(challenge_id): Path<DbId>,
) -> AppResult<Json<DataResponse<RebuildSummary>>> {
    rebuild(&state, LeaderboardKey::challenge(challenge_id)).await
}

async fn rebuild(
    state: &AppState,
    key: LeaderboardKey,
) -> AppResult<Json<DataResponse<RebuildSummary>>> {
    let outcome = state.engine.rebuild(&key).await?;
    Ok(Json(DataResponse {
        data: RebuildSummary {
            key: key.cache_key(),
            members: outcome.ground_truth.len(),
            cache_warmed: outcome.cache_warmed,
        },
    }))
}
