use std::net::SocketAddr;
use std::sync::Arc;

use fsim_core::store::Store;
use fsim_db::{MemoryStore, PgStore};
use fsim_orchestrator::WakeOnLan;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fsim_server::config::ServerConfig;
use fsim_server::router::build_router;
use fsim_server::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "fsim_server=debug,fsim_orchestrator=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Store ---
    let (store, pool) = match &config.database_url {
        Some(database_url) => {
            let pool = fsim_db::create_pool(database_url)
                .await
                .expect("Failed to connect to database");
            tracing::info!("Database connection pool created");

            fsim_db::health_check(&pool)
                .await
                .expect("Database health check failed");
            tracing::info!("Database health check passed");

            fsim_db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Database migrations applied");

            (Arc::new(PgStore::new(pool.clone())) as Arc<dyn Store>, Some(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, keeping records in memory");
            (Arc::new(MemoryStore::new()) as Arc<dyn Store>, None)
        }
    };

    // --- Engine ---
    let waker = Arc::new(WakeOnLan::new(config.wol_broadcast_addr));
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    let state = AppState::new(config, store, pool, waker);
    let engine = Arc::clone(&state.engine);
    let hub = Arc::clone(&state.hub);
    tracing::info!("Engine started");

    // --- Start server ---
    let app = build_router(state);
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    engine.shutdown().await;
    tracing::info!(
        open_channels = hub.connection_count().await,
        "Graceful shutdown complete"
    );
}

/// Wait for SIGINT or SIGTERM.
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
