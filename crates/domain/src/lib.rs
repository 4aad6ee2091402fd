pub mod aggregates;
pub mod commands;
pub mod errors;

pub use aggregates::booking::{
    Booking, BookingDraft, BookingStatus, CustomerInfo, PaymentInfo, PaymentMethod, PaymentStatus,
};
pub use aggregates::event::{Event, EventReview, EventStats, EventStatus, StatusCount};
pub use errors::{BookingError, FieldError, ParseEnumError, TransitionError, ValidationFailure};
