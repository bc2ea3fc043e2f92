#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use stride_cache::MemoryScoreStore;
use stride_core::conversion::RateScope;
use stride_engine::{EngineConfig, LeaderboardEngine, MemorySourceStore};
use tower::ServiceExt;

use stride_api::config::ServerConfig;
use stride_api::router::build_app_router;
use stride_api::state::AppState;

pub const CLUB: i64 = 7;
pub const ALICE: i64 = 1;
pub const BOB: i64 = 2;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        redis_url: None,
        log_json: false,
        engine: EngineConfig::default(),
    }
}

/// Application router over in-process stores, plus handles to them.
pub struct TestApp {
    pub router: Router,
    pub source: Arc<MemorySourceStore>,
    pub scores: Arc<MemoryScoreStore>,
}

/// Build the full application router with the production middleware stack.
pub fn build_test_app() -> TestApp {
    let config = test_config();
    let source = Arc::new(MemorySourceStore::new());
    let scores = Arc::new(MemoryScoreStore::new());
    let engine = LeaderboardEngine::new(source.clone(), scores.clone(), config.engine.clone());
    let state = AppState {
        config: Arc::new(config.clone()),
        engine,
    };
    TestApp {
        router: build_app_router(state, &config),
        source,
        scores,
    }
}

impl TestApp {
    /// Club `CLUB` with Alice and Bob; run/km worth 10 points.
    pub async fn seed_club(&self) {
        self.source.add_profile(ALICE, "Alice", None).await;
        self.source.add_profile(BOB, "Bob", None).await;
        self.source.add_club_member(CLUB, ALICE).await;
        self.source.add_club_member(CLUB, BOB).await;
        self.source.set_rate(RateScope::Global, "run", "kilometers", 10.0).await;
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        send(self.router.clone(), request).await
    }

    pub async fn post_json(
        &self,
        uri: &str,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        send(self.router.clone(), request).await
    }

    pub async fn post_empty(&self, uri: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        send(self.router.clone(), request).await
    }
}

async fn send(router: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, json)
}
