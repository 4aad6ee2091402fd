use booking_ledger::{BookingFilter, BookingLedger};
use common::metrics;
use domain::commands::booking_commands::{BookTicketsCommand, TicketRequest};
use domain::commands::event_commands::{CreateEventCommand, UpdateEventStatusCommand};
use domain::{Booking, BookingDraft, BookingError, BookingStatus, Event, EventStats, EventStatus};
use inventory_store::InventoryStore;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Coordinates the inventory store and the booking ledger.
///
/// Inventory is reserved before a booking is written and returned after a
/// booking is cancelled; a failed ledger write releases the reservation again.
#[derive(Clone)]
pub struct BookingManager {
    inventory: Arc<dyn InventoryStore>,
    ledger: Arc<dyn BookingLedger>,
}

impl BookingManager {
    pub fn new(inventory: Arc<dyn InventoryStore>, ledger: Arc<dyn BookingLedger>) -> Self {
        Self { inventory, ledger }
    }

    /// Reserve tickets and record the booking.
    ///
    /// Runs on its own task: dropping the returned future does not stop a
    /// reservation half way through.
    pub async fn book_tickets(&self, command: BookTicketsCommand) -> Result<Booking, BookingError> {
        let started = Instant::now();
        let result = match command.into_request() {
            Ok(request) => {
                let manager = self.clone();
                detached(async move { manager.reserve_and_record(request).await }).await
            }
            Err(failure) => Err(failure.into()),
        };
        metrics::record_command(
            "book_tickets",
            result.is_ok(),
            started.elapsed().as_secs_f64(),
        );
        result
    }

    async fn reserve_and_record(&self, request: TicketRequest) -> Result<Booking, BookingError> {
        let TicketRequest {
            event_id,
            customer,
            ticket_count,
            payment_method,
        } = request;

        let event = match self.inventory.reserve(event_id, ticket_count).await {
            Ok(event) => event,
            Err(e) => {
                let rejection = e.is_rejection();
                let err = BookingError::from(e);
                if rejection {
                    metrics::record_inventory_rejection(err.kind());
                    info!(event_id = %event_id, ticket_count, reason = %err, "Reservation refused");
                } else {
                    error!(event_id = %event_id, error = %err, "Reservation failed");
                }
                return Err(err);
            }
        };
        metrics::record_tickets_reserved(ticket_count);

        let draft = BookingDraft {
            event_id,
            customer,
            ticket_count,
            total_amount: f64::from(ticket_count) * event.price,
            payment_method,
        };

        match self.ledger.create(draft).await {
            Ok(booking) => {
                info!(
                    booking_id = %booking.booking_id,
                    event_id = %event_id,
                    ticket_count,
                    total_amount = booking.total_amount,
                    available = event.available_tickets,
                    "Tickets booked"
                );
                Ok(booking)
            }
            Err(e) => {
                warn!(
                    event_id = %event_id,
                    ticket_count,
                    error = %e,
                    "Booking could not be recorded, releasing reservation"
                );
                self.compensate(event_id, ticket_count, "book_tickets").await;
                Err(e.into())
            }
        }
    }

    /// Return tickets whose booking was never written
    async fn compensate(&self, event_id: Uuid, ticket_count: u32, operation: &str) {
        match self.inventory.release(event_id, ticket_count).await {
            Ok(event) => {
                metrics::record_compensation(operation, true);
                metrics::record_tickets_released(ticket_count);
                info!(
                    event_id = %event_id,
                    ticket_count,
                    available = event.available_tickets,
                    "Reservation released"
                );
            }
            Err(e) => {
                metrics::record_compensation(operation, false);
                error!(
                    event_id = %event_id,
                    ticket_count,
                    error = %e,
                    "Compensating release failed; inventory is short by these tickets"
                );
            }
        }
    }

    /// Cancel a booking by UUID or `BK...` code and return its tickets
    pub async fn cancel_booking(&self, id_or_code: &str) -> Result<Booking, BookingError> {
        let started = Instant::now();
        let result = self.cancel_inner(id_or_code).await;
        metrics::record_command(
            "cancel_booking",
            result.is_ok(),
            started.elapsed().as_secs_f64(),
        );
        result
    }

    async fn cancel_inner(&self, id_or_code: &str) -> Result<Booking, BookingError> {
        let booking = self.load(id_or_code).await?;
        if booking.status == BookingStatus::Cancelled {
            return Err(BookingError::AlreadyCancelled(booking.booking_id));
        }

        let manager = self.clone();
        detached(async move {
            let cancelled = manager.ledger.mark_cancelled(booking.id).await?;
            info!(booking_id = %cancelled.booking_id, "Booking cancelled");
            match manager.return_tickets(&cancelled).await? {
                Some(released) => Ok(released),
                None => manager.reload(cancelled).await,
            }
        })
        .await
    }

    /// Re-run the inventory release for a cancelled booking whose tickets were not returned
    pub async fn retry_release(&self, id_or_code: &str) -> Result<Booking, BookingError> {
        let started = Instant::now();
        let result = self.retry_inner(id_or_code).await;
        metrics::record_command(
            "retry_release",
            result.is_ok(),
            started.elapsed().as_secs_f64(),
        );
        result
    }

    async fn retry_inner(&self, id_or_code: &str) -> Result<Booking, BookingError> {
        let booking = self.load(id_or_code).await?;
        if booking.status != BookingStatus::Cancelled {
            return Err(BookingError::InvalidTransition {
                from: booking.status.to_string(),
                to: "released".to_string(),
            });
        }
        if booking.inventory_released {
            return Ok(booking);
        }

        let manager = self.clone();
        detached(async move {
            match manager.return_tickets(&booking).await? {
                Some(released) => Ok(released),
                None => manager.reload(booking).await,
            }
        })
        .await
    }

    /// Retry every pending release, oldest first; returns how many succeeded
    pub async fn release_pending(&self, limit: i64) -> Result<usize, BookingError> {
        let pending = self.ledger.list_pending_releases(limit).await?;
        let mut released = 0;
        for booking in pending {
            match self.return_tickets(&booking).await {
                Ok(Some(_)) => released += 1,
                Ok(None) => {}
                Err(e) => {
                    warn!(booking_id = %booking.booking_id, error = %e, "Pending release still failing")
                }
            }
        }
        Ok(released)
    }

    /// Give a cancelled booking's tickets back to its event.
    ///
    /// The ledger claim comes first so at most one caller releases a booking's
    /// tickets; `None` means another caller already holds the claim.
    async fn return_tickets(&self, booking: &Booking) -> Result<Option<Booking>, BookingError> {
        let ticket_count = u32::try_from(booking.ticket_count).unwrap_or(0);

        let claimed = match self.ledger.claim_release(booking.id).await {
            Ok(Some(claimed)) => claimed,
            Ok(None) => {
                info!(booking_id = %booking.booking_id, "Tickets already returned");
                return Ok(None);
            }
            Err(e) => {
                return Err(partial_cancellation(
                    booking,
                    format!("release could not be claimed: {}", e),
                ))
            }
        };

        if let Err(e) = self.inventory.release(booking.event_id, ticket_count).await {
            if let Err(revert) = self.ledger.revert_release(booking.id).await {
                error!(
                    booking_id = %booking.booking_id,
                    ticket_count,
                    error = %revert,
                    "Release claim not reverted; tickets need manual reconciliation"
                );
            }
            return Err(partial_cancellation(booking, e.to_string()));
        }

        metrics::record_tickets_released(ticket_count);
        info!(
            booking_id = %booking.booking_id,
            event_id = %booking.event_id,
            ticket_count,
            "Tickets returned to inventory"
        );
        Ok(Some(claimed))
    }

    /// Latest stored copy, falling back to what the caller already has
    async fn reload(&self, booking: Booking) -> Result<Booking, BookingError> {
        Ok(self.ledger.find_by_id(booking.id).await?.unwrap_or(booking))
    }

    pub async fn mark_attended(&self, id_or_code: &str) -> Result<Booking, BookingError> {
        let started = Instant::now();
        let result = async {
            let booking = self.load(id_or_code).await?;
            let attended = self.ledger.mark_attended(booking.id).await?;
            info!(booking_id = %attended.booking_id, "Booking marked attended");
            Ok::<_, BookingError>(attended)
        }
        .await;
        metrics::record_command(
            "mark_attended",
            result.is_ok(),
            started.elapsed().as_secs_f64(),
        );
        result
    }

    pub async fn get_booking(&self, id_or_code: &str) -> Result<Booking, BookingError> {
        let started = Instant::now();
        let result = self.load(id_or_code).await;
        metrics::record_query("get_booking", result.is_ok(), started.elapsed().as_secs_f64());
        result
    }

    pub async fn list_bookings(
        &self,
        filter: &BookingFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Booking>, BookingError> {
        let started = Instant::now();
        let result = self
            .ledger
            .list(filter, limit, offset)
            .await
            .map_err(BookingError::from);
        metrics::record_query("list_bookings", result.is_ok(), started.elapsed().as_secs_f64());
        result
    }

    /// Bookings for one event; unknown events are an error rather than an empty list
    pub async fn list_by_event(&self, event_id: Uuid) -> Result<Vec<Booking>, BookingError> {
        let started = Instant::now();
        let result = async {
            self.inventory
                .find_by_id(event_id)
                .await?
                .ok_or(BookingError::EventNotFound(event_id))?;
            Ok::<_, BookingError>(self.ledger.list_by_event(event_id).await?)
        }
        .await;
        metrics::record_query(
            "list_event_bookings",
            result.is_ok(),
            started.elapsed().as_secs_f64(),
        );
        result
    }

    pub async fn create_event(&self, command: CreateEventCommand) -> Result<Event, BookingError> {
        let started = Instant::now();
        let result = async {
            let event = command.into_event()?;
            self.inventory.insert(&event).await?;
            info!(event_id = %event.id, capacity = event.capacity, status = %event.status, "Event created");
            Ok::<_, BookingError>(event)
        }
        .await;
        metrics::record_command(
            "create_event",
            result.is_ok(),
            started.elapsed().as_secs_f64(),
        );
        result
    }

    pub async fn get_event(&self, event_id: Uuid) -> Result<Event, BookingError> {
        let started = Instant::now();
        let result = async {
            self.inventory
                .find_by_id(event_id)
                .await?
                .ok_or(BookingError::EventNotFound(event_id))
        }
        .await;
        metrics::record_query("get_event", result.is_ok(), started.elapsed().as_secs_f64());
        result
    }

    pub async fn list_events(
        &self,
        status: Option<EventStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Event>, BookingError> {
        let started = Instant::now();
        let result = self
            .inventory
            .list(status, limit, offset)
            .await
            .map_err(BookingError::from);
        metrics::record_query("list_events", result.is_ok(), started.elapsed().as_secs_f64());
        result
    }

    pub async fn event_stats(&self) -> Result<EventStats, BookingError> {
        let started = Instant::now();
        let result = self.inventory.stats().await.map_err(BookingError::from);
        metrics::record_query("event_stats", result.is_ok(), started.elapsed().as_secs_f64());
        result
    }

    pub async fn update_event_status(
        &self,
        event_id: Uuid,
        command: UpdateEventStatusCommand,
    ) -> Result<Event, BookingError> {
        let started = Instant::now();
        let result = async {
            let review = command.into_review()?;
            Ok::<_, BookingError>(self.inventory.update_status(event_id, &review).await?)
        }
        .await;
        metrics::record_command(
            "update_event_status",
            result.is_ok(),
            started.elapsed().as_secs_f64(),
        );
        result
    }

    /// Resolve a booking by UUID, falling back to the `BK...` code
    async fn load(&self, id_or_code: &str) -> Result<Booking, BookingError> {
        let key = id_or_code.trim();
        let found = match Uuid::parse_str(key) {
            Ok(id) => self.ledger.find_by_id(id).await?,
            Err(_) => self.ledger.find_by_booking_id(key).await?,
        };
        found.ok_or_else(|| BookingError::NotFound(key.to_string()))
    }
}

fn partial_cancellation(booking: &Booking, reason: String) -> BookingError {
    metrics::record_partial_cancellation();
    error!(
        booking_id = %booking.booking_id,
        event_id = %booking.event_id,
        ticket_count = booking.ticket_count,
        reason = %reason,
        "Booking cancelled but tickets were not returned to inventory"
    );
    BookingError::PartialCancellation {
        booking_id: booking.booking_id.clone(),
        ticket_count: booking.ticket_count,
        reason,
    }
}

/// Run `fut` to completion on its own task, independent of the caller
async fn detached<T, F>(fut: F) -> Result<T, BookingError>
where
    F: Future<Output = Result<T, BookingError>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(fut)
        .await
        .map_err(|e| BookingError::Internal(format!("booking task did not complete: {}", e)))?
}
