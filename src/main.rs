//! Countdown Keeper - A countdown timer service grouped by category
//!
//! This is the main entry point for the countdown-keeper application.

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

use countdown_keeper::{
    config::Config,
    state::AppState,
    api::create_router,
    store::FileStore,
    tasks::countdown_task,
    utils::shutdown_signal,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("countdown_keeper={},tower_http=info", config.log_level()))
        .init();

    let data_dir = config.data_dir();
    info!("Starting countdown-keeper v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration: host={}, port={}, data_dir={}, export_dir={}",
          config.host, config.port, data_dir.display(), config.export_dir().display());

    // Create application state and load persisted timers and history
    let store = Arc::new(FileStore::new(data_dir));
    let state = Arc::new(AppState::new(store, config.state_settings()));
    let report = state.activate().await;
    for warning in &report.warnings {
        warn!("Startup load: {}", warning);
    }

    // Start the countdown background task
    let countdown_state = Arc::clone(&state);
    tokio::spawn(async move {
        countdown_task(countdown_state).await;
    });

    // Create HTTP router with all endpoints
    let app = create_router(Arc::clone(&state));

    // Bind to the specified address
    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  GET    /timers                         - Timers grouped by category");
    info!("  POST   /timers                         - Add a timer");
    info!("  GET    /timers/stream                  - Live snapshots and completions (SSE)");
    info!("  POST   /timers/:id/{{start,pause,reset}} - Control one timer");
    info!("  POST   /categories/:category/:action   - Bulk start, pause or reset");
    info!("  POST   /activate                       - Reload from disk");
    info!("  GET    /history?category=              - Completion history");
    info!("  DELETE /history                        - Clear history");
    info!("  POST   /history/export                 - Export history to a file");
    info!("  GET    /status                         - Service status");

    // Setup graceful shutdown
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    if let Err(e) = state.flush().await {
        warn!("Final write did not complete: {}", e);
    }

    info!("Server shutdown complete");
    Ok(())
}
