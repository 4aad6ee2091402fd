use axum::{
    extract::{Path, State},
    Json,
};
use domain::Booking;

use crate::error::ApiError;
use crate::state::AppState;

pub async fn handle(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Booking>, ApiError> {
    let booking = state.manager.mark_attended(&id).await?;
    Ok(Json(booking))
}
