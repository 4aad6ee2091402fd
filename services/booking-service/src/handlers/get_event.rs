use axum::{
    extract::{rejection::PathRejection, Path, State},
    Json,
};
use domain::Event;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

pub async fn handle(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Event>, ApiError> {
    let Path(event_id) = id?;
    let event = state.manager.get_event(event_id).await?;
    Ok(Json(event))
}
