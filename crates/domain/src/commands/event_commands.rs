use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::aggregates::event::{Event, EventReview, EventStatus};
use crate::errors::ValidationFailure;

/// Command to create an event with a fixed ticket capacity
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventCommand {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,

    #[serde(default)]
    pub organizer_id: Option<String>,

    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,

    #[validate(range(min = 0.0, message = "Price cannot be negative"))]
    pub price: f64,

    #[validate(range(min = 0, message = "Capacity cannot be negative"))]
    pub capacity: i32,

    /// Initial status; events start as `DRAFT` unless submitted straight for review
    #[serde(default)]
    pub status: Option<String>,
}

impl CreateEventCommand {
    pub fn into_event(self) -> Result<Event, ValidationFailure> {
        let title = self.title.trim().to_string();
        let cmd = Self { title, ..self };

        let mut failure = match cmd.validate() {
            Ok(()) => ValidationFailure::new(),
            Err(errors) => ValidationFailure::from_validator(&errors),
        };

        if !cmd.price.is_finite() {
            failure.push("price", "Price must be a finite number");
        }

        let status = match cmd.status.as_deref() {
            None => EventStatus::Draft,
            Some(raw) => match raw.parse::<EventStatus>() {
                Ok(status @ (EventStatus::Draft | EventStatus::Pending)) => status,
                Ok(other) => {
                    failure.push(
                        "status",
                        format!("New events must start as DRAFT or PENDING, not {}", other),
                    );
                    EventStatus::Draft
                }
                Err(e) => {
                    failure.push("status", e.to_string());
                    EventStatus::Draft
                }
            },
        };

        failure.into_result()?;

        Ok(Event::new(
            cmd.title,
            cmd.organizer_id.filter(|o| !o.trim().is_empty()),
            cmd.starts_at,
            cmd.price,
            cmd.capacity,
            status,
        ))
    }
}

const MAX_FEEDBACK_LENGTH: usize = 1000;

/// Command to move an event through the review workflow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateEventStatusCommand {
    pub status: String,

    #[serde(default)]
    pub feedback: Option<String>,
}

impl UpdateEventStatusCommand {
    pub fn into_review(self) -> Result<EventReview, ValidationFailure> {
        let mut failure = ValidationFailure::new();

        let status = match self.status.parse::<EventStatus>() {
            Ok(status) => Some(status),
            Err(e) => {
                failure.push("status", e.to_string());
                None
            }
        };

        let feedback = self
            .feedback
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty());
        if feedback
            .as_ref()
            .is_some_and(|f| f.chars().count() > MAX_FEEDBACK_LENGTH)
        {
            failure.push(
                "feedback",
                format!("Feedback must be at most {} characters", MAX_FEEDBACK_LENGTH),
            );
        }

        match status {
            Some(status) if failure.is_empty() => Ok(EventReview { status, feedback }),
            _ => Err(failure),
        }
    }
}
