pub mod booking_commands;
pub mod event_commands;
