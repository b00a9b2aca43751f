//! DreamCation Itinerary Service
//!
//! Layered architecture:
//! - domain: itinerary entries and domain errors
//! - repository: data access traits and the SQLite implementation
//! - routes: axum handlers, bearer authentication via `auth`

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;

pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod repository;
pub mod routes;
pub mod state;

use auth::Hs256Verifier;
use config::Config;
use repository::{init_db, SqliteItineraryRepository};
pub use routes::router;
use state::AppState;

/// Open the database and wire the repository and verifier together
pub fn build_state(db_path: &Path, jwt_secret: &str) -> Result<Arc<AppState>, String> {
    let db_state = init_db(db_path)?;
    let repo = Arc::new(SqliteItineraryRepository::new(db_state.connection()));
    Ok(AppState::new(repo, Arc::new(Hs256Verifier::new(jwt_secret))))
}

/// Serve the router on `listener` until `shutdown` resolves
pub async fn serve(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

pub async fn start_server(config: Config) -> Result<(), String> {
    log::info!("Opening database at {}", config.database_path.display());
    let state = build_state(&config.database_path, &config.jwt_secret)?;

    let address = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|e| format!("Failed to bind {}: {}", address, e))?;
    log::info!("Itinerary service running on {}", address);

    serve(listener, state, shutdown_signal())
        .await
        .map_err(|e| format!("Server error: {}", e))?;

    log::info!("Itinerary service stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => log::info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                log::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                log::info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                log::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
