use std::sync::Arc;

use stride_engine::LeaderboardEngine;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: the engine holds its stores behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Leaderboard engine over the source of truth and the score cache.
    pub engine: LeaderboardEngine,
}
