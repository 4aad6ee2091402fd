pub mod booking_repository;
pub mod memory;

pub use booking_repository::{BookingFilter, BookingLedger, PostgresBookingLedger};
pub use memory::InMemoryBookingLedger;
