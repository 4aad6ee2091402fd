use axum::{
    extract::{Path, State},
    Json,
};
use domain::Booking;
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;

/// Cancel a booking and return its tickets to the event
pub async fn handle(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Booking>, ApiError> {
    info!(booking = %id, "Received cancel booking request");
    let booking = state.manager.cancel_booking(&id).await?;
    Ok(Json(booking))
}
