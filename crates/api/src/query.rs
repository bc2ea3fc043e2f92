//! Shared query parameter types for API handlers.

use serde::Deserialize;

/// Query parameters for leaderboard page endpoints
/// (`?activity_type=&limit=&offset=&rebuild=`).
///
/// Limits and offsets are clamped in the engine via `clamp_limit` /
/// `clamp_offset`.
#[derive(Debug, Default, Deserialize)]
pub struct LeaderboardParams {
    pub activity_type: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    /// Rebuild the cached leaderboard before reading it.
    #[serde(default)]
    pub rebuild: bool,
}

/// Optional activity type filter (`?activity_type=`).
#[derive(Debug, Default, Deserialize)]
pub struct ActivityTypeParams {
    pub activity_type: Option<String>,
}
