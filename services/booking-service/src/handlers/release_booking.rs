use axum::{
    extract::{Path, State},
    Json,
};
use domain::Booking;
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;

/// Retry returning a cancelled booking's tickets after a partial cancellation
pub async fn handle(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Booking>, ApiError> {
    info!(booking = %id, "Retrying inventory release");
    let booking = state.manager.retry_release(&id).await?;
    Ok(Json(booking))
}
