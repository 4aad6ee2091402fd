use axum::{
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use booking_ledger::{IdempotencyError, IdempotencyState, IdempotencyStore};
use common::metrics;
use domain::commands::booking_commands::BookTicketsCommand;
use domain::ValidationFailure;
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{ApiError, AppJson};
use crate::state::AppState;

pub const IDEMPOTENCY_HEADER: &str = "idempotency-key";
pub const REPLAYED_HEADER: &str = "idempotent-replayed";
const RECORD_ATTEMPTS: u32 = 3;
const RECORD_BACKOFF: Duration = Duration::from_millis(50);

/// Handle a ticket booking request
pub async fn handle(
    State(state): State<AppState>,
    headers: HeaderMap,
    AppJson(cmd): AppJson<BookTicketsCommand>,
) -> Result<Response, ApiError> {
    info!(
        event_id = %cmd.event_id,
        ticket_count = cmd.ticket_count,
        "Received booking request"
    );

    let key = idempotency_key(&headers)?;
    match (state.idempotency.as_deref(), key) {
        (Some(store), Some(key)) => book_once(&state, store, &key, cmd).await,
        _ => book(&state, cmd).await,
    }
}

async fn book(state: &AppState, cmd: BookTicketsCommand) -> Result<Response, ApiError> {
    let booking = state.manager.book_tickets(cmd).await?;
    Ok((StatusCode::CREATED, Json(booking)).into_response())
}

/// Book at most once per idempotency key
async fn book_once(
    state: &AppState,
    store: &IdempotencyStore,
    key: &str,
    cmd: BookTicketsCommand,
) -> Result<Response, ApiError> {
    match store.claim(key).await {
        Ok(IdempotencyState::New) => metrics::record_idempotency_check("new"),
        Ok(IdempotencyState::InFlight) => {
            metrics::record_idempotency_check("in_flight");
            return Err(ApiError::idempotency_conflict(key));
        }
        Ok(IdempotencyState::Completed(previous)) => {
            metrics::record_idempotency_check("duplicate");
            info!(idempotency_key = %key, "Replaying stored booking response");
            let mut response = (StatusCode::CREATED, Json(previous)).into_response();
            response
                .headers_mut()
                .insert(REPLAYED_HEADER, HeaderValue::from_static("true"));
            return Ok(response);
        }
        Err(IdempotencyError::InvalidKey(reason)) => {
            return Err(ApiError::validation(ValidationFailure::single(
                "Idempotency-Key",
                reason,
            )));
        }
        Err(e) => {
            metrics::record_idempotency_check("unavailable");
            warn!(idempotency_key = %key, error = %e, "Idempotency store unavailable, booking without it");
            return book(state, cmd).await;
        }
    }

    match state.manager.book_tickets(cmd).await {
        Ok(booking) => {
            match serde_json::to_value(&booking) {
                Ok(value) => {
                    let value = &value;
                    let recorded =
                        with_retries(RECORD_ATTEMPTS, move || store.complete(key, value)).await;
                    if let Err(e) = recorded {
                        warn!(
                            idempotency_key = %key,
                            error = %e,
                            "Failed to record booking response; key stays in flight until its marker expires"
                        );
                    }
                }
                Err(e) => warn!(idempotency_key = %key, error = %e, "Failed to serialize booking response"),
            }
            Ok((StatusCode::CREATED, Json(booking)).into_response())
        }
        Err(err) => {
            if let Err(e) = store.release(key).await {
                warn!(idempotency_key = %key, error = %e, "Failed to free idempotency key");
            }
            Err(err.into())
        }
    }
}

/// Run `op` up to `attempts` times, backing off linearly between failures
async fn with_retries<T, E, F, Fut>(attempts: u32, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Err(_) if attempt < attempts => {
                tokio::time::sleep(RECORD_BACKOFF * attempt).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}

fn idempotency_key(headers: &HeaderMap) -> Result<Option<String>, ApiError> {
    match headers.get(IDEMPOTENCY_HEADER) {
        None => Ok(None),
        Some(value) => value
            .to_str()
            .map(|key| Some(key.trim().to_string()))
            .map_err(|_| {
                ApiError::validation(ValidationFailure::single(
                    "Idempotency-Key",
                    "Header must be visible ASCII",
                ))
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idempotency_key_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(idempotency_key(&headers).unwrap(), None);

        headers.insert(IDEMPOTENCY_HEADER, HeaderValue::from_static(" order-42 "));
        assert_eq!(
            idempotency_key(&headers).unwrap(),
            Some("order-42".to_string())
        );
    }

    #[tokio::test]
    async fn test_response_recording_retries_transient_failures() {
        let calls = std::cell::Cell::new(0);
        let result: Result<u32, &str> = with_retries(3, || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move {
                if n < 3 {
                    Err("redis timeout")
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result, Ok(3));

        calls.set(0);
        let result: Result<u32, &str> = with_retries(2, || {
            calls.set(calls.get() + 1);
            async { Err("redis down") }
        })
        .await;
        assert_eq!(result, Err("redis down"));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_non_ascii_key_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert(
            IDEMPOTENCY_HEADER,
            HeaderValue::from_bytes("clé".as_bytes()).unwrap(),
        );
        let err = idempotency_key(&headers).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
