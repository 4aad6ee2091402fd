use axum::{
    extract::{rejection::PathRejection, Path, State},
    Json,
};
use domain::Booking;
use serde::Serialize;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventBookingsResponse {
    pub event_id: Uuid,
    pub bookings: Vec<Booking>,
}

/// All bookings for one event; 404 when the event does not exist
pub async fn handle(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<EventBookingsResponse>, ApiError> {
    let Path(event_id) = id?;
    let bookings = state.manager.list_by_event(event_id).await?;
    Ok(Json(EventBookingsResponse { event_id, bookings }))
}
