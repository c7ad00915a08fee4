use kyc_gateway::config::Config;
use kyc_gateway::handlers::AppState;
use kyc_gateway::routes::build_router;
use kyc_gateway::storage::ensure_dir;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the application.
///
/// This function initializes the application, including:
/// - Logging and tracing.
/// - Configuration loading.
/// - Upload storage directory.
/// - OCR engine and field extractor.
/// - HTTP routes and middleware (CORS, body limit, tracing).
///
/// It then starts the Axum server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kyc_gateway=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    ensure_dir(&config.storage_path).await?;
    tracing::info!("Upload storage ready at {}", config.storage_path.display());

    let port = config.port;
    let app_name = config.app_name.clone();

    // Build application state
    let app_state = Arc::new(AppState::from_config(config)?);
    let app = build_router(app_state);

    // Start server
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("{} listening on {}", app_name, addr);

    axum::serve(listener, app).await?;

    Ok(())
}
