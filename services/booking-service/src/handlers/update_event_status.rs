use axum::{
    extract::{rejection::PathRejection, Path, State},
    Json,
};
use domain::commands::event_commands::UpdateEventStatusCommand;
use domain::Event;
use tracing::info;
use uuid::Uuid;

use crate::error::{ApiError, AppJson};
use crate::state::AppState;

/// Move an event through the review workflow
pub async fn handle(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    AppJson(cmd): AppJson<UpdateEventStatusCommand>,
) -> Result<Json<Event>, ApiError> {
    let Path(event_id) = id?;
    info!(event_id = %event_id, status = %cmd.status, "Received event status change");
    let event = state.manager.update_event_status(event_id, cmd).await?;
    Ok(Json(event))
}
