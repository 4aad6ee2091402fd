use async_trait::async_trait;
use domain::{Event, EventReview, EventStats, EventStatus, StatusCount};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

use crate::{classify_rejection, InventoryError, InventoryStore};

/// In-process inventory store.
///
/// Every operation runs its check and its write under one mutex guard, which
/// gives the same atomicity the PostgreSQL conditional update provides.
#[derive(Default)]
pub struct InMemoryInventoryStore {
    events: Mutex<HashMap<Uuid, Event>>,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, HashMap<Uuid, Event>> {
        // Mutations never span an await or a fallible step, so a poisoned map is still consistent.
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl InventoryStore for InMemoryInventoryStore {
    async fn insert(&self, event: &Event) -> Result<(), InventoryError> {
        let mut events = self.guard();
        if events.contains_key(&event.id) {
            return Err(InventoryError::DuplicateEvent(event.id));
        }
        events.insert(event.id, event.clone());
        Ok(())
    }

    async fn find_by_id(&self, event_id: Uuid) -> Result<Option<Event>, InventoryError> {
        Ok(self.guard().get(&event_id).cloned())
    }

    async fn list(
        &self,
        status: Option<EventStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Event>, InventoryError> {
        let mut events: Vec<Event> = self
            .guard()
            .values()
            .filter(|e| status.map_or(true, |s| e.status == s))
            .cloned()
            .collect();
        events.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(events
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn reserve(&self, event_id: Uuid, quantity: u32) -> Result<Event, InventoryError> {
        let mut events = self.guard();
        let event = events
            .get_mut(&event_id)
            .ok_or(InventoryError::EventNotFound(event_id))?;

        if let Some(rejection) = classify_rejection(event, quantity) {
            return Err(rejection);
        }

        event.apply_reservation(quantity);
        debug!(
            event_id = %event_id,
            quantity,
            available = event.available_tickets,
            "Reserved tickets"
        );
        Ok(event.clone())
    }

    async fn release(&self, event_id: Uuid, quantity: u32) -> Result<Event, InventoryError> {
        let mut events = self.guard();
        let event = events
            .get_mut(&event_id)
            .ok_or(InventoryError::EventNotFound(event_id))?;

        event.apply_release(quantity);
        debug!(
            event_id = %event_id,
            quantity,
            available = event.available_tickets,
            "Released tickets"
        );
        Ok(event.clone())
    }

    async fn update_status(
        &self,
        event_id: Uuid,
        review: &EventReview,
    ) -> Result<Event, InventoryError> {
        let mut events = self.guard();
        let event = events
            .get_mut(&event_id)
            .ok_or(InventoryError::EventNotFound(event_id))?;

        event.review(review)?;
        Ok(event.clone())
    }

    async fn stats(&self) -> Result<EventStats, InventoryError> {
        let events = self.guard();
        let mut counts: HashMap<EventStatus, i64> = HashMap::new();
        let mut organizers = HashSet::new();
        for event in events.values() {
            *counts.entry(event.status).or_default() += 1;
            if let Some(organizer) = &event.organizer_id {
                organizers.insert(organizer.as_str());
            }
        }

        let by_status = counts
            .into_iter()
            .map(|(status, count)| StatusCount { status, count })
            .collect();
        Ok(EventStats::new(by_status, organizers.len() as i64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    async fn store_with(status: EventStatus, capacity: i32) -> (InMemoryInventoryStore, Uuid) {
        let store = InMemoryInventoryStore::new();
        let event = Event::new("Gig".to_string(), None, None, 250.0, capacity, status);
        let id = event.id;
        store.insert(&event).await.unwrap();
        (store, id)
    }

    #[tokio::test]
    async fn test_reserve_decrements() {
        let (store, id) = store_with(EventStatus::Published, 10).await;

        let event = store.reserve(id, 3).await.unwrap();
        assert_eq!(event.available_tickets, 7);
        assert_eq!(event.price, 250.0);
    }

    #[tokio::test]
    async fn test_reserve_exact_remaining_then_fail() {
        let (store, id) = store_with(EventStatus::Approved, 4).await;

        let event = store.reserve(id, 4).await.unwrap();
        assert_eq!(event.available_tickets, 0);

        let result = store.reserve(id, 1).await;
        assert!(matches!(
            result,
            Err(InventoryError::InsufficientInventory { available: 0, .. })
        ));
    }

    #[tokio::test]
    async fn test_reserve_rejects_unbookable_event() {
        let (store, id) = store_with(EventStatus::Pending, 10).await;

        let result = store.reserve(id, 1).await;
        assert!(matches!(result, Err(InventoryError::EventNotBookable { .. })));

        let event = store.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(event.available_tickets, 10);
    }

    #[tokio::test]
    async fn test_unknown_event() {
        let store = InMemoryInventoryStore::new();
        let id = Uuid::new_v4();
        assert!(matches!(
            store.reserve(id, 1).await,
            Err(InventoryError::EventNotFound(_))
        ));
        assert!(matches!(
            store.release(id, 1).await,
            Err(InventoryError::EventNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_release_never_exceeds_capacity() {
        let (store, id) = store_with(EventStatus::Published, 5).await;
        store.reserve(id, 2).await.unwrap();

        assert_eq!(store.release(id, 2).await.unwrap().available_tickets, 5);
        assert_eq!(store.release(id, 2).await.unwrap().available_tickets, 5);
    }

    #[tokio::test]
    async fn test_duplicate_insert_rejected() {
        let (store, id) = store_with(EventStatus::Draft, 5).await;
        let existing = store.find_by_id(id).await.unwrap().unwrap();
        assert!(matches!(
            store.insert(&existing).await,
            Err(InventoryError::DuplicateEvent(_))
        ));
    }

    fn review(status: EventStatus, feedback: Option<&str>) -> EventReview {
        EventReview {
            status,
            feedback: feedback.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_status_workflow_and_listing() {
        let (store, id) = store_with(EventStatus::Draft, 5).await;

        store
            .update_status(id, &review(EventStatus::Pending, None))
            .await
            .unwrap();
        let result = store
            .update_status(id, &review(EventStatus::Published, None))
            .await;
        assert!(matches!(result, Err(InventoryError::InvalidTransition { .. })));

        let approved = store
            .update_status(id, &review(EventStatus::Approved, Some("Venue confirmed")))
            .await
            .unwrap();
        assert_eq!(approved.feedback.as_deref(), Some("Venue confirmed"));
        assert!(approved.reviewed_at.is_some());
        let approved = store.list(Some(EventStatus::Approved), 10, 0).await.unwrap();
        assert_eq!(approved.len(), 1);
        assert!(store
            .list(Some(EventStatus::Draft), 10, 0)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_stats_count_statuses_and_organizers() {
        let store = InMemoryInventoryStore::new();
        for (organizer, status) in [
            (Some("org-1"), EventStatus::Published),
            (Some("org-1"), EventStatus::Published),
            (Some("org-2"), EventStatus::Draft),
            (None, EventStatus::Cancelled),
        ] {
            let event = Event::new(
                "Gig".to_string(),
                organizer.map(str::to_string),
                None,
                10.0,
                5,
                status,
            );
            store.insert(&event).await.unwrap();
        }

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_events, 4);
        assert_eq!(stats.organizer_count, 2);
        let published = stats
            .event_stats
            .iter()
            .find(|s| s.status == EventStatus::Published)
            .unwrap();
        assert_eq!(published.count, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reservations_never_oversell() {
        let (store, id) = store_with(EventStatus::Published, 25).await;
        let store = Arc::new(store);

        let handles: Vec<_> = (0..100)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.reserve(id, 1).await.is_ok() })
            })
            .collect();

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap() {
                successes += 1;
            }
        }

        assert_eq!(successes, 25);
        let event = store.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(event.available_tickets, 0);
    }
}
