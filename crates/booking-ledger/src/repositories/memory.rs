use async_trait::async_trait;
use chrono::Utc;
use domain::{Booking, BookingDraft, BookingStatus};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::{BookingFilter, BookingLedger};
use crate::LedgerError;

/// In-process ledger keyed by booking UUID
#[derive(Default)]
pub struct InMemoryBookingLedger {
    bookings: Mutex<HashMap<Uuid, Booking>>,
}

impl InMemoryBookingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, HashMap<Uuid, Booking>> {
        self.bookings
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn update(
        &self,
        id: Uuid,
        apply: impl FnOnce(&mut Booking) -> Result<(), LedgerError>,
    ) -> Result<Booking, LedgerError> {
        let mut bookings = self.guard();
        let booking = bookings
            .get_mut(&id)
            .ok_or_else(|| LedgerError::not_found(id))?;
        apply(booking)?;
        Ok(booking.clone())
    }
}

#[async_trait]
impl BookingLedger for InMemoryBookingLedger {
    async fn create(&self, draft: BookingDraft) -> Result<Booking, LedgerError> {
        draft.validate().map_err(LedgerError::Validation)?;

        let mut bookings = self.guard();
        let mut booking = Booking::from_draft(draft.clone());
        while bookings.values().any(|b| b.booking_id == booking.booking_id) {
            booking = Booking::from_draft(draft.clone());
        }
        bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>, LedgerError> {
        Ok(self.guard().get(&id).cloned())
    }

    async fn find_by_booking_id(&self, booking_id: &str) -> Result<Option<Booking>, LedgerError> {
        Ok(self
            .guard()
            .values()
            .find(|b| b.booking_id == booking_id)
            .cloned())
    }

    async fn list_by_event(&self, event_id: Uuid) -> Result<Vec<Booking>, LedgerError> {
        let mut bookings: Vec<Booking> = self
            .guard()
            .values()
            .filter(|b| b.event_id == event_id)
            .cloned()
            .collect();
        bookings.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(bookings)
    }

    async fn list(
        &self,
        filter: &BookingFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Booking>, LedgerError> {
        let mut bookings: Vec<Booking> = self
            .guard()
            .values()
            .filter(|b| filter.matches(b))
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(bookings
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn mark_cancelled(&self, id: Uuid) -> Result<Booking, LedgerError> {
        self.update(id, |booking| {
            booking
                .cancel()
                .map_err(|e| LedgerError::from_transition(booking, e))
        })
    }

    async fn mark_attended(&self, id: Uuid) -> Result<Booking, LedgerError> {
        self.update(id, |booking| {
            booking
                .attend()
                .map_err(|e| LedgerError::from_transition(booking, e))
        })
    }

    async fn claim_release(&self, id: Uuid) -> Result<Option<Booking>, LedgerError> {
        let mut bookings = self.guard();
        let booking = bookings
            .get_mut(&id)
            .ok_or_else(|| LedgerError::not_found(id))?;
        ensure_cancelled(booking)?;
        if booking.inventory_released {
            return Ok(None);
        }
        booking.inventory_released = true;
        booking.updated_at = Utc::now();
        Ok(Some(booking.clone()))
    }

    async fn revert_release(&self, id: Uuid) -> Result<Booking, LedgerError> {
        self.update(id, |booking| {
            ensure_cancelled(booking)?;
            booking.inventory_released = false;
            booking.updated_at = Utc::now();
            Ok(())
        })
    }

    async fn list_pending_releases(&self, limit: i64) -> Result<Vec<Booking>, LedgerError> {
        let mut pending: Vec<Booking> = self
            .guard()
            .values()
            .filter(|b| b.needs_release())
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.updated_at.cmp(&b.updated_at));
        pending.truncate(limit.max(0) as usize);
        Ok(pending)
    }
}

fn ensure_cancelled(booking: &Booking) -> Result<(), LedgerError> {
    if booking.status != BookingStatus::Cancelled {
        return Err(LedgerError::InvalidTransition {
            from: booking.status.as_str(),
            to: BookingStatus::Cancelled.as_str(),
        });
    }
    Ok(())
}
