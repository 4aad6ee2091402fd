use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use booking_ledger::BookingFilter;
use domain::{Booking, BookingStatus, ValidationFailure};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::pagination::{check_pagination, default_limit};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListBookingsParams {
    pub event_id: Option<Uuid>,
    pub user_id: Option<String>,
    pub status: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

#[derive(Debug, Serialize)]
pub struct BookingListResponse {
    pub bookings: Vec<Booking>,
    pub limit: i64,
    pub offset: i64,
}

/// List bookings, newest first, filtered by event, user or status
pub async fn handle(
    State(state): State<AppState>,
    params: Result<Query<ListBookingsParams>, QueryRejection>,
) -> Result<Json<BookingListResponse>, ApiError> {
    let Query(params) = params?;
    check_pagination(params.limit, params.offset)?;

    let status = params
        .status
        .as_deref()
        .map(str::parse::<BookingStatus>)
        .transpose()
        .map_err(|e| ApiError::validation(ValidationFailure::single("status", e.to_string())))?;

    let filter = BookingFilter {
        event_id: params.event_id,
        user_id: params.user_id.filter(|u| !u.trim().is_empty()),
        status,
    };

    let bookings = state
        .manager
        .list_bookings(&filter, params.limit, params.offset)
        .await?;

    Ok(Json(BookingListResponse {
        bookings,
        limit: params.limit,
        offset: params.offset,
    }))
}
