use axum::{
    async_trait,
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequest, Request,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domain::{BookingError, FieldError, ValidationFailure};
use serde::Serialize;
use std::fmt::Display;
use tracing::error;

const INTERNAL_MESSAGE: &str = "An internal error occurred";

/// Error response returned by every handler
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
    details: Vec<FieldError>,
}

#[derive(Serialize)]
struct ErrorBody {
    kind: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    details: Vec<FieldError>,
}

impl ApiError {
    fn new(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: message.into(),
            details: Vec::new(),
        }
    }

    pub fn validation(failure: ValidationFailure) -> Self {
        let message = failure.to_string();
        Self {
            details: failure.fields,
            ..Self::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
        }
    }

    pub fn idempotency_conflict(key: &str) -> Self {
        Self::new(
            StatusCode::CONFLICT,
            "IDEMPOTENCY_CONFLICT",
            format!("A request with Idempotency-Key '{}' is still being processed", key),
        )
    }

    /// Log `cause` and answer with a generic 500
    pub fn internal(cause: impl Display) -> Self {
        error!(error = %cause, "Internal error");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", INTERNAL_MESSAGE)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }
}

impl From<BookingError> for ApiError {
    fn from(err: BookingError) -> Self {
        let kind = err.kind();
        match err {
            BookingError::Validation(failure) => Self::validation(failure),
            BookingError::EventNotFound(_) | BookingError::NotFound(_) => {
                Self::new(StatusCode::NOT_FOUND, kind, err.to_string())
            }
            BookingError::EventNotBookable { .. }
            | BookingError::InsufficientInventory { .. }
            | BookingError::AlreadyCancelled(_)
            | BookingError::InvalidTransition { .. } => {
                Self::new(StatusCode::BAD_REQUEST, kind, err.to_string())
            }
            BookingError::PartialCancellation {
                ref booking_id,
                ticket_count,
                ref reason,
            } => {
                error!(
                    booking_id = %booking_id,
                    ticket_count,
                    reason = %reason,
                    "Partial cancellation"
                );
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    kind,
                    format!(
                        "Booking {} was cancelled but its {} tickets were not returned to inventory; \
                         retry with POST /bookings/{}/release",
                        booking_id, ticket_count, booking_id
                    ),
                )
            }
            BookingError::Storage(_) | BookingError::Internal(_) => Self::internal(err),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::validation(ValidationFailure::single("body", rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::validation(ValidationFailure::single("query", rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::validation(ValidationFailure::single("id", rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            kind: self.kind,
            message: self.message,
            details: self.details,
        };
        (self.status, Json(body)).into_response()
    }
}

/// `Json` extractor whose rejections use the API error body
pub struct AppJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for AppJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (BookingError::NotFound("BK1".to_string()), StatusCode::NOT_FOUND),
            (BookingError::EventNotFound(Uuid::new_v4()), StatusCode::NOT_FOUND),
            (BookingError::AlreadyCancelled("BK1".to_string()), StatusCode::BAD_REQUEST),
            (
                BookingError::InsufficientInventory {
                    event_id: Uuid::new_v4(),
                    requested: 3,
                    available: 1,
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                BookingError::Storage("connection reset".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn test_storage_errors_are_not_echoed() {
        let api = ApiError::from(BookingError::Storage("password=hunter2".to_string()));
        assert_eq!(api.kind(), "INTERNAL_ERROR");
        assert_eq!(api.message, INTERNAL_MESSAGE);
    }

    #[test]
    fn test_partial_cancellation_names_retry_route() {
        let api = ApiError::from(BookingError::PartialCancellation {
            booking_id: "BK0011223344".to_string(),
            ticket_count: 2,
            reason: "timeout".to_string(),
        });
        assert_eq!(api.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.kind(), "PARTIAL_CANCELLATION");
        assert!(api.message.contains("/bookings/BK0011223344/release"));
    }

    #[test]
    fn test_validation_carries_details() {
        let mut failure = ValidationFailure::new();
        failure.push("ticketCount", "Ticket count must be at least 1");
        failure.push("customerInfo.email", "A valid email address is required");

        let api = ApiError::validation(failure);
        assert_eq!(api.status(), StatusCode::BAD_REQUEST);
        assert_eq!(api.details.len(), 2);
    }
}
