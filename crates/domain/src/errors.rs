use serde::Serialize;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;
use validator::{ValidationErrors, ValidationErrorsKind};

use crate::aggregates::event::EventStatus;

/// Error taxonomy surfaced by booking operations.
///
/// Every variant maps to a stable machine-readable kind (see [`BookingError::kind`])
/// so callers can branch on it without parsing messages.
#[derive(Debug, Error)]
pub enum BookingError {
    #[error("Validation error: {0}")]
    Validation(ValidationFailure),

    #[error("Event not found: {0}")]
    EventNotFound(Uuid),

    #[error("Event {event_id} is not open for booking (status {status})")]
    EventNotBookable { event_id: Uuid, status: EventStatus },

    #[error("Not enough tickets available: requested {requested}, available {available}")]
    InsufficientInventory {
        event_id: Uuid,
        requested: u32,
        available: i32,
    },

    #[error("Booking {0} is already cancelled")]
    AlreadyCancelled(String),

    #[error(
        "Booking {booking_id} was cancelled but its {ticket_count} tickets were not returned to inventory: {reason}"
    )]
    PartialCancellation {
        booking_id: String,
        ticket_count: i32,
        reason: String,
    },

    #[error("Booking not found: {0}")]
    NotFound(String),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BookingError {
    /// Stable identifier for the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            BookingError::Validation(_) => "VALIDATION_ERROR",
            BookingError::EventNotFound(_) => "EVENT_NOT_FOUND",
            BookingError::EventNotBookable { .. } => "EVENT_NOT_BOOKABLE",
            BookingError::InsufficientInventory { .. } => "INSUFFICIENT_INVENTORY",
            BookingError::AlreadyCancelled(_) => "ALREADY_CANCELLED",
            BookingError::PartialCancellation { .. } => "PARTIAL_CANCELLATION",
            BookingError::NotFound(_) => "NOT_FOUND",
            BookingError::InvalidTransition { .. } => "INVALID_TRANSITION",
            BookingError::Storage(_) => "STORAGE_ERROR",
            BookingError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<ValidationFailure> for BookingError {
    fn from(failure: ValidationFailure) -> Self {
        BookingError::Validation(failure)
    }
}

/// Rejected status change on an event or a booking
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("already cancelled")]
    AlreadyCancelled,

    #[error("Invalid status transition from {from} to {to}")]
    Invalid {
        from: &'static str,
        to: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown {kind} '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// A single field-level validation problem, keyed by the wire (camelCase) field path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationFailure {
    pub fields: Vec<FieldError>,
}

impl ValidationFailure {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut failure = Self::new();
        failure.push(field, message);
        failure
    }

    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.fields.push(FieldError {
            field: field.to_string(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Flatten `validator` errors (including nested structs) into wire field paths
    pub fn from_validator(errors: &ValidationErrors) -> Self {
        let mut failure = Self::new();
        collect_errors(errors, "", &mut failure.fields);
        failure.fields.sort_by(|a, b| a.field.cmp(&b.field));
        failure
    }

    /// `Ok(())` when nothing was recorded
    pub fn into_result(self) -> Result<(), ValidationFailure> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .fields
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect::<Vec<_>>()
            .join("; ");
        write!(f, "{}", joined)
    }
}

fn collect_errors(errors: &ValidationErrors, prefix: &str, out: &mut Vec<FieldError>) {
    for (field, kind) in errors.errors() {
        let path = join_path(prefix, &camel_case(&field.to_string()));
        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                for error in field_errors {
                    let message = error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("failed '{}' check", error.code));
                    out.push(FieldError {
                        field: path.clone(),
                        message,
                    });
                }
            }
            ValidationErrorsKind::Struct(nested) => collect_errors(nested, &path, out),
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    collect_errors(nested, &format!("{}[{}]", path, index), out);
                }
            }
        }
    }
}

fn join_path(prefix: &str, field: &str) -> String {
    if prefix.is_empty() {
        field.to_string()
    } else {
        format!("{}.{}", prefix, field)
    }
}

fn camel_case(snake: &str) -> String {
    let mut out = String::with_capacity(snake.len());
    let mut upper_next = false;
    for c in snake.chars() {
        if c == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camel_case() {
        assert_eq!(camel_case("full_name"), "fullName");
        assert_eq!(camel_case("customer_info"), "customerInfo");
        assert_eq!(camel_case("email"), "email");
    }

    #[test]
    fn test_validation_failure_display() {
        let mut failure = ValidationFailure::new();
        failure.push("ticketCount", "must be at least 1");
        failure.push("paymentMethod", "unknown");
        assert_eq!(
            failure.to_string(),
            "ticketCount: must be at least 1; paymentMethod: unknown"
        );
        assert!(failure.clone().into_result().is_err());
        assert!(ValidationFailure::new().into_result().is_ok());
    }

    #[test]
    fn test_error_kinds_are_stable() {
        let err = BookingError::InsufficientInventory {
            event_id: Uuid::new_v4(),
            requested: 3,
            available: 1,
        };
        assert_eq!(err.kind(), "INSUFFICIENT_INVENTORY");
        assert_eq!(
            BookingError::AlreadyCancelled("BK1".to_string()).kind(),
            "ALREADY_CANCELLED"
        );
        assert_eq!(
            BookingError::from(ValidationFailure::single("x", "y")).kind(),
            "VALIDATION_ERROR"
        );
    }
}
