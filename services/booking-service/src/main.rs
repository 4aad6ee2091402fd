use common::config::AppConfig;
use common::telemetry::{init_telemetry, shutdown_telemetry, TelemetryConfig};
use tower_http::trace::TraceLayer;

mod error;
mod handlers;
mod routes;
mod state;

/// Cancelled bookings whose release is retried at startup
const STARTUP_RELEASE_BATCH: i64 = 100;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    let telemetry_config = TelemetryConfig::from_env("booking-service");
    let jaeger = telemetry_config.enable_jaeger;
    init_telemetry(telemetry_config)?;

    let config = AppConfig::from_env()?;
    tracing::info!(
        storage = ?config.storage,
        idempotency = config.idempotency.enabled,
        jaeger,
        "Starting booking service"
    );

    // Initialize application state
    let state = state::AppState::new(&config).await?;

    match state.manager.release_pending(STARTUP_RELEASE_BATCH).await {
        Ok(0) => {}
        Ok(released) => tracing::info!(released, "Returned tickets for stuck cancellations"),
        Err(e) => tracing::warn!(error = %e, "Could not sweep pending releases"),
    }

    // Build router with tracing layer
    let app = routes::build_router(state).layer(TraceLayer::new_for_http());

    let addr = config.bind_address();
    tracing::info!(address = %addr, "Booking service listening");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Server error");
            e
        })?;

    // Shutdown telemetry gracefully
    shutdown_telemetry();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
