pub mod health;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// WebSocket endpoints for workers and observers.
pub fn ws_routes() -> Router<AppState> {
    Router::new()
        .route("/commands", get(ws::commands_handler))
        .route("/notifications", get(ws::notifications_handler))
}
