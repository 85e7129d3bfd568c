#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use fsim_db::MemoryStore;
use fsim_orchestrator::NoopWaker;
use fsim_server::config::ServerConfig;
use fsim_server::router::build_router;
use fsim_server::state::AppState;
use http_body_util::BodyExt;
use tower::ServiceExt;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        database_url: None,
        worker_connect_timeout_secs: 300,
        stop_join_timeout_secs: 2,
        wol_broadcast_addr: "127.0.0.1:9".parse().unwrap(),
    }
}

/// Application state over an in-memory store and a no-op waker.
pub fn test_state(store: Arc<MemoryStore>) -> AppState {
    AppState::new(test_config(), store, None, Arc::new(NoopWaker))
}

pub fn build_test_app(store: Arc<MemoryStore>) -> Router {
    build_router(test_state(store))
}

/// Serve the app on an ephemeral localhost port.
pub async fn spawn_server(state: AppState) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = build_router(state);
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });
    addr
}

pub async fn get(app: Router, uri: &str) -> Response {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
