use std::net::SocketAddr;
use std::sync::Arc;

use stride_cache::{MemoryScoreStore, RedisScoreStore, RedisStoreConfig, ScoreStore};
use stride_engine::{LeaderboardEngine, PgSourceStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use stride_api::config::ServerConfig;
use stride_api::router::build_app_router;
use stride_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Configuration ---
    let config = ServerConfig::from_env();

    // --- Tracing ---
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "stride_api=debug,stride_engine=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);
    if config.log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = stride_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    stride_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    stride_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Score cache ---
    let scores: Arc<dyn ScoreStore> = match &config.redis_url {
        Some(url) => {
            let store = RedisScoreStore::new(RedisStoreConfig::new(url.as_str()))
                .expect("REDIS_URL must be a valid Redis URL");
            if let Err(e) = store.ping().await {
                tracing::warn!(
                    error = %e,
                    "Score cache not reachable yet, serving from source until it is",
                );
            }
            Arc::new(store)
        }
        None => {
            tracing::warn!("REDIS_URL not set, using in-process score cache");
            Arc::new(MemoryScoreStore::new())
        }
    };

    // --- Engine ---
    let source = Arc::new(PgSourceStore::new(pool, config.engine.progress_max_attempts));
    let engine = LeaderboardEngine::new(source, scores, config.engine.clone());
    tracing::info!(
        cache_ttl_secs = config.engine.cache_ttl.as_secs(),
        unit_policy = ?config.engine.unit_policy,
        "Leaderboard engine ready",
    );

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        engine,
    };

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or (on Unix) SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
