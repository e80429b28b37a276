// API Server Binary Entry Point
//
// Purpose: Start the Axum API server over one trait matrix
// Usage: MATRIX_PATH=data/sample_matrix.json cargo run --features api --bin api_server

use taxon_key_scorer::{AppState, create_router};
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing (structured logging)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    // Default log level: info for our crate, warn for others
                    "taxon_key_scorer=info,tower_http=debug,warn".into()
                }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting API server...");

    // Configuration from environment variables
    let matrix_path = std::env::var("MATRIX_PATH")
        .unwrap_or_else(|_| "data/sample_matrix.json".to_string());

    let options_path = std::env::var("OPTIONS_PATH").ok();

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);

    tracing::info!("Configuration:");
    tracing::info!("  MATRIX_PATH: {}", matrix_path);
    tracing::info!("  OPTIONS_PATH: {}", options_path.as_deref().unwrap_or("(defaults)"));
    tracing::info!("  PORT: {}", port);

    let state = AppState::new(&matrix_path, options_path.as_deref())?;
    tracing::info!("Application state initialized successfully");

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .await?;

    Ok(())
}
