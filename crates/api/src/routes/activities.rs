//! Route definitions for the `/activities` resource.

use axum::routing::post;
use axum::Router;

use crate::handlers::activities;
use crate::state::AppState;

/// Routes mounted at `/activities`.
///
/// ```text
/// POST /   -> record_activity
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/", post(activities::record_activity))
}
