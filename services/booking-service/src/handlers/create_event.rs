use axum::{extract::State, http::StatusCode, Json};
use domain::commands::event_commands::CreateEventCommand;
use domain::Event;

use crate::error::{ApiError, AppJson};
use crate::state::AppState;

/// Create an event with a fixed ticket capacity
pub async fn handle(
    State(state): State<AppState>,
    AppJson(cmd): AppJson<CreateEventCommand>,
) -> Result<(StatusCode, Json<Event>), ApiError> {
    let event = state.manager.create_event(cmd).await?;
    Ok((StatusCode::CREATED, Json(event)))
}
