use axum::{extract::State, Json};
use domain::EventStats;

use crate::error::ApiError;
use crate::state::AppState;

pub async fn handle(State(state): State<AppState>) -> Result<Json<EventStats>, ApiError> {
    let stats = state.manager.event_stats().await?;
    Ok(Json(stats))
}
