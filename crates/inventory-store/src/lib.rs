pub mod memory;
pub mod postgres_inventory_store;

pub use memory::InMemoryInventoryStore;
pub use postgres_inventory_store::PostgresInventoryStore;

use async_trait::async_trait;
use domain::{BookingError, Event, EventReview, EventStats, EventStatus, TransitionError};
use thiserror::Error;
use uuid::Uuid;

/// Durable storage of events and the only way to move `available_tickets`.
///
/// `reserve` and `release` must each be a single atomic storage operation:
/// the availability check and the write commit together or not at all.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Persist a newly created event
    async fn insert(&self, event: &Event) -> Result<(), InventoryError>;

    /// Load an event by ID
    async fn find_by_id(&self, event_id: Uuid) -> Result<Option<Event>, InventoryError>;

    /// List events, newest first, optionally filtered by status
    async fn list(
        &self,
        status: Option<EventStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Event>, InventoryError>;

    /// Atomically take `quantity` tickets if the event is bookable and has enough left
    async fn reserve(&self, event_id: Uuid, quantity: u32) -> Result<Event, InventoryError>;

    /// Atomically return `quantity` tickets, capped at capacity
    async fn release(&self, event_id: Uuid, quantity: u32) -> Result<Event, InventoryError>;

    /// Move the event through the review workflow
    async fn update_status(
        &self,
        event_id: Uuid,
        review: &EventReview,
    ) -> Result<Event, InventoryError>;

    /// Event counts by status plus the number of distinct organizers
    async fn stats(&self) -> Result<EventStats, InventoryError>;
}

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("Event not found: {0}")]
    EventNotFound(Uuid),

    #[error("Event {event_id} is not bookable in status {status}")]
    EventNotBookable { event_id: Uuid, status: EventStatus },

    #[error("Insufficient inventory for event {event_id}: requested {requested}, available {available}")]
    InsufficientInventory {
        event_id: Uuid,
        requested: u32,
        available: i32,
    },

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },

    #[error("Event already exists: {0}")]
    DuplicateEvent(Uuid),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Corrupt event record: {0}")]
    CorruptRecord(String),
}

impl InventoryError {
    /// Rejections that reflect the request, not a storage fault
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            InventoryError::EventNotFound(_)
                | InventoryError::EventNotBookable { .. }
                | InventoryError::InsufficientInventory { .. }
                | InventoryError::InvalidTransition { .. }
        )
    }
}

impl From<InventoryError> for BookingError {
    fn from(err: InventoryError) -> Self {
        match err {
            InventoryError::EventNotFound(id) => BookingError::EventNotFound(id),
            InventoryError::EventNotBookable { event_id, status } => {
                BookingError::EventNotBookable { event_id, status }
            }
            InventoryError::InsufficientInventory {
                event_id,
                requested,
                available,
            } => BookingError::InsufficientInventory {
                event_id,
                requested,
                available,
            },
            InventoryError::InvalidTransition { from, to } => BookingError::InvalidTransition {
                from: from.to_string(),
                to: to.to_string(),
            },
            other => BookingError::Storage(other.to_string()),
        }
    }
}

/// Explain why a reservation did not apply to `event`.
///
/// Shared by both stores so they classify rejections identically.
pub(crate) fn classify_rejection(event: &Event, quantity: u32) -> Option<InventoryError> {
    if !event.status.is_bookable() {
        return Some(InventoryError::EventNotBookable {
            event_id: event.id,
            status: event.status,
        });
    }
    if !event.has_available(quantity) {
        return Some(InventoryError::InsufficientInventory {
            event_id: event.id,
            requested: quantity,
            available: event.available_tickets,
        });
    }
    None
}

impl From<TransitionError> for InventoryError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::Invalid { from, to } => InventoryError::InvalidTransition { from, to },
            TransitionError::AlreadyCancelled => InventoryError::InvalidTransition {
                from: EventStatus::Cancelled.as_str(),
                to: EventStatus::Cancelled.as_str(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(status: EventStatus, capacity: i32) -> Event {
        Event::new("Gig".to_string(), None, None, 100.0, capacity, status)
    }

    #[test]
    fn test_classify_not_bookable_before_inventory() {
        let draft = event(EventStatus::Draft, 0);
        assert!(matches!(
            classify_rejection(&draft, 1),
            Some(InventoryError::EventNotBookable {
                status: EventStatus::Draft,
                ..
            })
        ));
    }

    #[test]
    fn test_classify_insufficient() {
        let published = event(EventStatus::Published, 2);
        assert!(matches!(
            classify_rejection(&published, 3),
            Some(InventoryError::InsufficientInventory {
                requested: 3,
                available: 2,
                ..
            })
        ));
        assert!(classify_rejection(&published, 2).is_none());
    }

    #[test]
    fn test_booking_error_conversion_keeps_kind() {
        let id = Uuid::new_v4();
        let err: BookingError = InventoryError::EventNotFound(id).into();
        assert_eq!(err.kind(), "EVENT_NOT_FOUND");

        let err: BookingError = InventoryError::CorruptRecord("bad".to_string()).into();
        assert_eq!(err.kind(), "STORAGE_ERROR");
    }
}
