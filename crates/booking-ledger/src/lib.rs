pub mod idempotency;
pub mod repositories;

pub use idempotency::{IdempotencyError, IdempotencyState, IdempotencyStore};
pub use repositories::{BookingFilter, BookingLedger, InMemoryBookingLedger, PostgresBookingLedger};

use domain::{Booking, BookingError, TransitionError, ValidationFailure};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Validation error: {0}")]
    Validation(ValidationFailure),

    #[error("Booking not found: {0}")]
    NotFound(String),

    #[error("Booking {0} is already cancelled")]
    AlreadyCancelled(String),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },

    #[error("Booking code collision: {0}")]
    DuplicateBooking(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Corrupt booking record: {0}")]
    CorruptRecord(String),
}

impl LedgerError {
    /// Why a status change on `booking` did not apply
    pub(crate) fn from_transition(booking: &Booking, err: TransitionError) -> Self {
        match err {
            TransitionError::AlreadyCancelled => {
                LedgerError::AlreadyCancelled(booking.booking_id.clone())
            }
            TransitionError::Invalid { from, to } => LedgerError::InvalidTransition { from, to },
        }
    }

    pub(crate) fn not_found(id: Uuid) -> Self {
        LedgerError::NotFound(id.to_string())
    }
}

impl From<LedgerError> for BookingError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Validation(failure) => BookingError::Validation(failure),
            LedgerError::NotFound(id) => BookingError::NotFound(id),
            LedgerError::AlreadyCancelled(code) => BookingError::AlreadyCancelled(code),
            LedgerError::InvalidTransition { from, to } => BookingError::InvalidTransition {
                from: from.to_string(),
                to: to.to_string(),
            },
            other => BookingError::Storage(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_errors_keep_their_kind() {
        let err: BookingError = LedgerError::AlreadyCancelled("BK1".to_string()).into();
        assert_eq!(err.kind(), "ALREADY_CANCELLED");

        let err: BookingError = LedgerError::InvalidTransition {
            from: "attended",
            to: "cancelled",
        }
        .into();
        assert_eq!(err.kind(), "INVALID_TRANSITION");

        let err: BookingError = LedgerError::DuplicateBooking("BK1".to_string()).into();
        assert_eq!(err.kind(), "STORAGE_ERROR");
    }
}
