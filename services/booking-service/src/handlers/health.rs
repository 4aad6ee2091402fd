use axum::{extract::State, Json};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub storage: &'static str,
    pub idempotency: bool,
}

/// Liveness plus the backends this instance was started with
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "booking-service",
        version: env!("CARGO_PKG_VERSION"),
        storage: state.storage.as_str(),
        idempotency: state.idempotency.is_some(),
    })
}
