//! Route definitions for the `/leaderboards` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::leaderboards;
use crate::state::AppState;

/// Routes mounted at `/leaderboards`.
///
/// ```text
/// GET  /clubs/{club_id}                              -> club_leaderboard
/// GET  /clubs/{club_id}/members/{user_id}            -> club_member_standing
/// POST /clubs/{club_id}/rebuild                      -> rebuild_club
/// GET  /challenges/{challenge_id}                    -> challenge_leaderboard
/// GET  /challenges/{challenge_id}/members/{user_id}  -> challenge_member_standing
/// POST /challenges/{challenge_id}/rebuild            -> rebuild_challenge
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/clubs/{club_id}", get(leaderboards::club_leaderboard))
        .route(
            "/clubs/{club_id}/members/{user_id}",
            get(leaderboards::club_member_standing),
        )
        .route("/clubs/{club_id}/rebuild", post(leaderboards::rebuild_club))
        .route(
            "/challenges/{challenge_id}",
            get(leaderboards::challenge_leaderboard),
        )
        .route(
            "/challenges/{challenge_id}/members/{user_id}",
            get(leaderboards::challenge_member_standing),
        )
        .route(
            "/challenges/{challenge_id}/rebuild",
            post(leaderboards::rebuild_challenge),
        )
}
