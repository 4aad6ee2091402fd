use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use domain::{Event, EventStatus, ValidationFailure};
use serde::{Deserialize, Serialize};

use super::pagination::{check_pagination, default_limit};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListEventsParams {
    pub status: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

#[derive(Debug, Serialize)]
pub struct EventListResponse {
    pub events: Vec<Event>,
    pub limit: i64,
    pub offset: i64,
}

pub async fn handle(
    State(state): State<AppState>,
    params: Result<Query<ListEventsParams>, QueryRejection>,
) -> Result<Json<EventListResponse>, ApiError> {
    let Query(params) = params?;
    check_pagination(params.limit, params.offset)?;

    let status = params
        .status
        .as_deref()
        .map(str::parse::<EventStatus>)
        .transpose()
        .map_err(|e| ApiError::validation(ValidationFailure::single("status", e.to_string())))?;

    let events = state
        .manager
        .list_events(status, params.limit, params.offset)
        .await?;

    Ok(Json(EventListResponse {
        events,
        limit: params.limit,
        offset: params.offset,
    }))
}
