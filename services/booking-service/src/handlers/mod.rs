pub mod attend_booking;
pub mod cancel_booking;
pub mod create_booking;
pub mod create_event;
pub mod event_stats;
pub mod get_booking;
pub mod get_event;
pub mod health;
pub mod list_bookings;
pub mod list_event_bookings;
pub mod list_events;
pub mod pagination;
pub mod release_booking;
pub mod update_event_status;
