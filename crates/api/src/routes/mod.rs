pub mod activities;
pub mod health;
pub mod leaderboards;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /leaderboards/clubs/{club_id}                              club page (GET)
/// /leaderboards/clubs/{club_id}/members/{user_id}            member standing (GET)
/// /leaderboards/clubs/{club_id}/rebuild                      rebuild (POST)
/// /leaderboards/challenges/{challenge_id}                    challenge page (GET)
/// /leaderboards/challenges/{challenge_id}/members/{user_id}  participant standing (GET)
/// /leaderboards/challenges/{challenge_id}/rebuild            rebuild (POST)
///
/// /activities                                                record activity (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/leaderboards", leaderboards::router())
        .nest("/activities", activities::router())
}
