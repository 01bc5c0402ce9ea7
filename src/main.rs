//! linknotes server - link preview metadata for the notes editor.
//!
//! Serves `POST /api/fetch-metadata`, which fetches a pasted URL and
//! returns the title, description, image, favicon and site name used to
//! render a link card.

use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use linknotes::{handlers, AppState, Config};

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("linknotes=info")),
        )
        .init();

    let config = Config::from_env();

    let state = match AppState::new(&config.fetch) {
        Ok(state) => Arc::new(state),
        Err(e) => {
            tracing::error!(error = %e, "failed to build HTTP client");
            std::process::exit(1);
        }
    };

    let app = handlers::router(state);

    let listener = match tokio::net::TcpListener::bind(&config.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(addr = %config.bind_addr, error = %e, "failed to bind");
            std::process::exit(1);
        }
    };

    tracing::info!("Server running at http://{}", config.bind_addr);
    if config.fetch.allow_private_hosts {
        tracing::warn!("Private network hosts: ALLOWED (LINKNOTES_ALLOW_PRIVATE set)");
    }

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "server error");
        std::process::exit(1);
    }
}
