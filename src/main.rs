use fieldmap::bootstrap;
use fieldmap::config::Config;
use fieldmap::infrastructure::http::router::build_router;
use fieldmap::infrastructure::observability;
use std::time::Duration;

const SESSION_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing and metrics
    let _observability = observability::init(&config)?;
    tracing::info!(environment = ?config.environment, "Configuration loaded");

    // Build application state
    let state = bootstrap::build_app_state(&config).await?;

    // Drop signed-out sessions and abandoned sign-in attempts
    let sessions = state.sessions.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            sessions.cleanup_idle().await;
        }
    });

    // Build router
    let app = build_router(state);

    // Start server
    let addr = config.server_address();
    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
