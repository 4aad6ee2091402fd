use axum::{
    extract::{Path, State},
    Json,
};
use domain::Booking;

use crate::error::ApiError;
use crate::state::AppState;

/// Fetch a booking by UUID or `BK...` code
pub async fn handle(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Booking>, ApiError> {
    let booking = state.manager.get_booking(&id).await?;
    Ok(Json(booking))
}
