use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Router,
};
use common::metrics;

use crate::handlers::{
    attend_booking, cancel_booking, create_booking, create_event, event_stats, get_booking,
    get_event, health, list_bookings, list_event_bookings, list_events, release_booking,
    update_event_status,
};
use crate::state::AppState;

/// Prometheus metrics endpoint handler
async fn metrics_handler() -> impl IntoResponse {
    match metrics::gather_metrics() {
        Ok(metrics) => (StatusCode::OK, metrics),
        Err(e) => {
            tracing::error!(error = %e, "Failed to gather metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                String::from("Failed to gather metrics"),
            )
        }
    }
}

/// Build the application router with all routes
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/metrics", get(metrics_handler))
        // Bookings
        .route(
            "/bookings",
            post(create_booking::handle).get(list_bookings::handle),
        )
        .route("/bookings/:id", get(get_booking::handle))
        .route("/bookings/:id/cancel", patch(cancel_booking::handle))
        .route("/bookings/:id/attend", patch(attend_booking::handle))
        .route("/bookings/:id/release", post(release_booking::handle))
        // Events
        .route("/events", post(create_event::handle).get(list_events::handle))
        .route("/events/stats/overview", get(event_stats::handle))
        .route("/events/:id", get(get_event::handle))
        .route("/events/:id/status", patch(update_event_status::handle))
        .route("/events/:id/bookings", get(list_event_bookings::handle))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    /// Create an event and walk it to APPROVED so it accepts bookings
    async fn bookable_event(app: &Router, capacity: i64) -> String {
        let (status, event) = send(
            app,
            Method::POST,
            "/events",
            Some(json!({
                "title": "Monsoon Jam",
                "organizerId": "org_1",
                "price": 500.0,
                "capacity": capacity,
                "status": "PENDING"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = event["id"].as_str().unwrap().to_string();

        let (status, approved) = send(
            app,
            Method::PATCH,
            &format!("/events/{}/status", id),
            Some(json!({"status": "APPROVED"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(approved["status"], "APPROVED");
        id
    }

    fn booking_body(event_id: &str, ticket_count: i64) -> Value {
        json!({
            "eventId": event_id,
            "customerInfo": {
                "fullName": "Asha Rai",
                "email": "asha@example.com",
                "phone": "9800000000"
            },
            "ticketCount": ticket_count,
            "paymentMethod": "khalti",
            "userId": "user_7"
        })
    }

    #[tokio::test]
    async fn test_health_and_metrics() {
        let app = build_router(AppState::in_memory());

        let (status, body) = send(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["storage"], "memory");

        // Touch a counter so the registry is non-empty
        metrics::record_idempotency_check("new");
        let response = app
            .clone()
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let text = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&text).contains("ticketing_"));
    }

    #[tokio::test]
    async fn test_booking_lifecycle() {
        let app = build_router(AppState::in_memory());
        let event_id = bookable_event(&app, 100).await;

        let (status, booking) =
            send(&app, Method::POST, "/bookings", Some(booking_body(&event_id, 3))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(booking["totalAmount"], 1500.0);
        assert_eq!(booking["status"], "confirmed");
        assert_eq!(booking["payment"]["method"], "khalti");
        let code = booking["bookingId"].as_str().unwrap().to_string();

        let (_, event) = send(&app, Method::GET, &format!("/events/{}", event_id), None).await;
        assert_eq!(event["availableTickets"], 97);

        let (status, fetched) = send(&app, Method::GET, &format!("/bookings/{}", code), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["id"], booking["id"]);

        let (status, cancelled) =
            send(&app, Method::PATCH, &format!("/bookings/{}/cancel", code), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cancelled["status"], "cancelled");
        assert_eq!(cancelled["inventoryReleased"], true);

        let (status, error) =
            send(&app, Method::PATCH, &format!("/bookings/{}/cancel", code), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error["kind"], "ALREADY_CANCELLED");

        let (_, event) = send(&app, Method::GET, &format!("/events/{}", event_id), None).await;
        assert_eq!(event["availableTickets"], 100);

        let (status, listed) = send(
            &app,
            Method::GET,
            "/bookings?userId=user_7&status=cancelled&limit=5",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed["bookings"].as_array().unwrap().len(), 1);
        assert_eq!(listed["limit"], 5);
    }

    #[tokio::test]
    async fn test_insufficient_inventory() {
        let app = build_router(AppState::in_memory());
        let event_id = bookable_event(&app, 2).await;

        let (status, error) =
            send(&app, Method::POST, "/bookings", Some(booking_body(&event_id, 3))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error["kind"], "INSUFFICIENT_INVENTORY");
    }

    #[tokio::test]
    async fn test_validation_errors_carry_details() {
        let app = build_router(AppState::in_memory());
        let event_id = bookable_event(&app, 10).await;

        let mut body = booking_body(&event_id, 0);
        body["paymentMethod"] = json!("cash");
        body["customerInfo"]["email"] = json!("nope");

        let (status, error) = send(&app, Method::POST, "/bookings", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error["kind"], "VALIDATION_ERROR");
        let fields: Vec<&str> = error["details"]
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["field"].as_str().unwrap())
            .collect();
        assert!(fields.contains(&"ticketCount"));
        assert!(fields.contains(&"paymentMethod"));
        assert!(fields.contains(&"customerInfo.email"));

        let (_, event) = send(&app, Method::GET, &format!("/events/{}", event_id), None).await;
        assert_eq!(event["availableTickets"], 10);
    }

    #[tokio::test]
    async fn test_malformed_json_is_a_validation_error() {
        let app = build_router(AppState::in_memory());
        let request = Request::post("/bookings")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{\"eventId\": "))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let error: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(error["kind"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_not_found_responses() {
        let app = build_router(AppState::in_memory());

        let (status, error) = send(&app, Method::GET, "/bookings/BKNOTREAL01", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(error["kind"], "NOT_FOUND");

        let uri = format!("/events/{}/bookings", uuid::Uuid::new_v4());
        let (status, error) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(error["kind"], "EVENT_NOT_FOUND");

        let (status, error) = send(&app, Method::GET, "/events/not-a-uuid", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error["kind"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_pagination_bounds_enforced() {
        let app = build_router(AppState::in_memory());

        let (status, error) = send(&app, Method::GET, "/bookings?limit=500", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error["details"][0]["field"], "limit");

        let (status, _) = send(&app, Method::GET, "/events?offset=-1", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, error) = send(&app, Method::GET, "/events?status=LIVE", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error["details"][0]["field"], "status");
    }

    #[tokio::test]
    async fn test_event_workflow_rejections() {
        let app = build_router(AppState::in_memory());
        let (_, event) = send(
            &app,
            Method::POST,
            "/events",
            Some(json!({"title": "Draft Night", "price": 100.0, "capacity": 5})),
        )
        .await;
        let id = event["id"].as_str().unwrap().to_string();
        assert_eq!(event["status"], "DRAFT");

        let (status, error) = send(
            &app,
            Method::POST,
            "/bookings",
            Some(booking_body(&id, 1)),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error["kind"], "EVENT_NOT_BOOKABLE");

        let (status, error) = send(
            &app,
            Method::PATCH,
            &format!("/events/{}/status", id),
            Some(json!({"status": "PUBLISHED"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error["kind"], "INVALID_TRANSITION");
    }

    #[tokio::test]
    async fn test_review_feedback_and_stats_overview() {
        let app = build_router(AppState::in_memory());
        bookable_event(&app, 10).await;
        let (_, pending) = send(
            &app,
            Method::POST,
            "/events",
            Some(json!({
                "title": "Late Submission",
                "organizerId": "org_2",
                "price": 100.0,
                "capacity": 5,
                "status": "PENDING"
            })),
        )
        .await;
        let id = pending["id"].as_str().unwrap();

        let (status, rejected) = send(
            &app,
            Method::PATCH,
            &format!("/events/{}/status", id),
            Some(json!({"status": "REJECTED", "feedback": "Missing venue"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(rejected["feedback"], "Missing venue");
        assert!(rejected["reviewedAt"].is_string());

        let (status, stats) = send(&app, Method::GET, "/events/stats/overview", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stats["totalEvents"], 2);
        assert_eq!(stats["organizerCount"], 2);
        assert_eq!(
            stats["eventStats"],
            json!([
                {"status": "APPROVED", "count": 1},
                {"status": "REJECTED", "count": 1}
            ])
        );
    }

    #[tokio::test]
    async fn test_attend_then_release_rejected() {
        let app = build_router(AppState::in_memory());
        let event_id = bookable_event(&app, 10).await;
        let (_, booking) =
            send(&app, Method::POST, "/bookings", Some(booking_body(&event_id, 1))).await;
        let id = booking["id"].as_str().unwrap().to_string();

        let (status, attended) =
            send(&app, Method::PATCH, &format!("/bookings/{}/attend", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(attended["status"], "attended");

        let (status, error) =
            send(&app, Method::POST, &format!("/bookings/{}/release", id), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error["kind"], "INVALID_TRANSITION");

        let (status, bookings) =
            send(&app, Method::GET, &format!("/events/{}/bookings", event_id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(bookings["bookings"].as_array().unwrap().len(), 1);
    }
}
