use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{
    Booking, BookingDraft, BookingStatus, CustomerInfo, PaymentInfo, PaymentMethod, PaymentStatus,
};
use sqlx::{FromRow, PgPool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::LedgerError;

const BOOKING_COLUMNS: &str = "id, booking_id, event_id, customer_full_name, customer_email, \
                               customer_phone, customer_address, user_id, ticket_count, \
                               total_amount, payment_method, payment_transaction_id, \
                               payment_status, paid_at, status, inventory_released, \
                               created_at, updated_at";

const BOOKING_CODE_CONSTRAINT: &str = "bookings_booking_id_key";
const MAX_CODE_ATTEMPTS: usize = 3;

/// Optional filters for listing bookings; unset fields match everything
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookingFilter {
    pub event_id: Option<Uuid>,
    pub user_id: Option<String>,
    pub status: Option<BookingStatus>,
}

impl BookingFilter {
    pub fn matches(&self, booking: &Booking) -> bool {
        self.event_id.map_or(true, |id| booking.event_id == id)
            && self
                .user_id
                .as_deref()
                .map_or(true, |user| booking.customer.user_id.as_deref() == Some(user))
            && self.status.map_or(true, |s| booking.status == s)
    }
}

/// Durable record of bookings.
///
/// Status changes are single atomic conditional writes, so two concurrent
/// cancellations of one booking cannot both succeed.
#[async_trait]
pub trait BookingLedger: Send + Sync {
    /// Record a confirmed booking, generating its identifiers
    async fn create(&self, draft: BookingDraft) -> Result<Booking, LedgerError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>, LedgerError>;

    /// Look up by the human-facing `BK...` code
    async fn find_by_booking_id(&self, booking_id: &str) -> Result<Option<Booking>, LedgerError>;

    /// All bookings for an event, oldest first
    async fn list_by_event(&self, event_id: Uuid) -> Result<Vec<Booking>, LedgerError>;

    /// Filtered listing, newest first
    async fn list(
        &self,
        filter: &BookingFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Booking>, LedgerError>;

    /// Atomically move `confirmed -> cancelled`
    async fn mark_cancelled(&self, id: Uuid) -> Result<Booking, LedgerError>;

    /// Atomically move `confirmed -> attended`
    async fn mark_attended(&self, id: Uuid) -> Result<Booking, LedgerError>;

    /// Claim a cancelled booking's tickets for return by flipping
    /// `inventory_released` from false to true in one conditional write.
    ///
    /// `None` when the tickets were already claimed. Only the caller that got
    /// `Some` may release them to inventory.
    async fn claim_release(&self, id: Uuid) -> Result<Option<Booking>, LedgerError>;

    /// Give up a claim whose inventory release did not commit
    async fn revert_release(&self, id: Uuid) -> Result<Booking, LedgerError>;

    /// Cancelled bookings whose tickets have not been returned yet
    async fn list_pending_releases(&self, limit: i64) -> Result<Vec<Booking>, LedgerError>;
}

#[derive(Debug, FromRow)]
struct BookingRow {
    id: Uuid,
    booking_id: String,
    event_id: Uuid,
    customer_full_name: String,
    customer_email: String,
    customer_phone: String,
    customer_address: Option<String>,
    user_id: Option<String>,
    ticket_count: i32,
    total_amount: f64,
    payment_method: String,
    payment_transaction_id: String,
    payment_status: String,
    paid_at: DateTime<Utc>,
    status: String,
    inventory_released: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = LedgerError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        let corrupt = |e: domain::ParseEnumError| {
            LedgerError::CorruptRecord(format!("booking {}: {}", row.booking_id, e))
        };
        let method = row.payment_method.parse::<PaymentMethod>().map_err(corrupt)?;
        let payment_status = row.payment_status.parse::<PaymentStatus>().map_err(corrupt)?;
        let status = row.status.parse::<BookingStatus>().map_err(corrupt)?;

        Ok(Booking {
            id: row.id,
            booking_id: row.booking_id,
            event_id: row.event_id,
            customer: CustomerInfo {
                full_name: row.customer_full_name,
                email: row.customer_email,
                phone: row.customer_phone,
                address: row.customer_address,
                user_id: row.user_id,
            },
            ticket_count: row.ticket_count,
            total_amount: row.total_amount,
            payment: PaymentInfo {
                method,
                transaction_id: row.payment_transaction_id,
                status: payment_status,
                paid_at: row.paid_at,
            },
            status,
            inventory_released: row.inventory_released,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// PostgreSQL implementation of BookingLedger
pub struct PostgresBookingLedger {
    pool: PgPool,
}

impl PostgresBookingLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the database pool (useful for testing)
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn insert(&self, booking: &Booking) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO bookings (
                id, booking_id, event_id, customer_full_name, customer_email,
                customer_phone, customer_address, user_id, ticket_count,
                total_amount, payment_method, payment_transaction_id,
                payment_status, paid_at, status, inventory_released,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            "#,
        )
        .bind(booking.id)
        .bind(&booking.booking_id)
        .bind(booking.event_id)
        .bind(&booking.customer.full_name)
        .bind(&booking.customer.email)
        .bind(&booking.customer.phone)
        .bind(&booking.customer.address)
        .bind(&booking.customer.user_id)
        .bind(booking.ticket_count)
        .bind(booking.total_amount)
        .bind(booking.payment.method.as_str())
        .bind(&booking.payment.transaction_id)
        .bind(booking.payment.status.as_str())
        .bind(booking.payment.paid_at)
        .bind(booking.status.as_str())
        .bind(booking.inventory_released)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Explain why a conditional status update matched no row
    async fn rejection(
        &self,
        id: Uuid,
        apply: fn(&mut Booking) -> Result<(), domain::TransitionError>,
    ) -> LedgerError {
        match self.find_by_id(id).await {
            Ok(Some(mut booking)) => match apply(&mut booking) {
                Err(e) => LedgerError::from_transition(&booking, e),
                // The row changed between the update and this read
                Ok(()) => LedgerError::InvalidTransition {
                    from: booking.status.as_str(),
                    to: booking.status.as_str(),
                },
            },
            Ok(None) => LedgerError::not_found(id),
            Err(e) => e,
        }
    }

    async fn transition(
        &self,
        id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
    ) -> Result<Option<Booking>, LedgerError> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            r#"
            UPDATE bookings
            SET status = $3, updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        ))
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Booking::try_from).transpose()
    }

    /// Flip `inventory_released` on a cancelled booking if it still holds `from`
    async fn set_released(
        &self,
        id: Uuid,
        from: bool,
        to: bool,
    ) -> Result<Option<Booking>, LedgerError> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            r#"
            UPDATE bookings
            SET inventory_released = $4, updated_at = NOW()
            WHERE id = $1 AND status = $2 AND inventory_released = $3
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        ))
        .bind(id)
        .bind(BookingStatus::Cancelled.as_str())
        .bind(from)
        .bind(to)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Booking::try_from).transpose()
    }
}

#[async_trait]
impl BookingLedger for PostgresBookingLedger {
    async fn create(&self, draft: BookingDraft) -> Result<Booking, LedgerError> {
        draft.validate().map_err(LedgerError::Validation)?;

        let mut attempt = 1;
        loop {
            let booking = Booking::from_draft(draft.clone());
            match self.insert(&booking).await {
                Ok(()) => {
                    info!(
                        booking_id = %booking.booking_id,
                        event_id = %booking.event_id,
                        ticket_count = booking.ticket_count,
                        "Booking recorded"
                    );
                    return Ok(booking);
                }
                Err(sqlx::Error::Database(db))
                    if db.constraint() == Some(BOOKING_CODE_CONSTRAINT) =>
                {
                    if attempt >= MAX_CODE_ATTEMPTS {
                        return Err(LedgerError::DuplicateBooking(booking.booking_id));
                    }
                    warn!(booking_id = %booking.booking_id, attempt, "Booking code collision, regenerating");
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>, LedgerError> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE id = $1",
            BOOKING_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Booking::try_from).transpose()
    }

    async fn find_by_booking_id(&self, booking_id: &str) -> Result<Option<Booking>, LedgerError> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE booking_id = $1",
            BOOKING_COLUMNS
        ))
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Booking::try_from).transpose()
    }

    async fn list_by_event(&self, event_id: Uuid) -> Result<Vec<Booking>, LedgerError> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE event_id = $1 ORDER BY created_at ASC",
            BOOKING_COLUMNS
        ))
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Booking::try_from).collect()
    }

    async fn list(
        &self,
        filter: &BookingFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Booking>, LedgerError> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            r#"
            SELECT {}
            FROM bookings
            WHERE ($1::UUID IS NULL OR event_id = $1)
              AND ($2::TEXT IS NULL OR user_id = $2)
              AND ($3::TEXT IS NULL OR status = $3)
            ORDER BY created_at DESC
            LIMIT $4 OFFSET $5
            "#,
            BOOKING_COLUMNS
        ))
        .bind(filter.event_id)
        .bind(filter.user_id.as_deref())
        .bind(filter.status.map(|s| s.as_str()))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Booking::try_from).collect()
    }

    async fn mark_cancelled(&self, id: Uuid) -> Result<Booking, LedgerError> {
        match self
            .transition(id, BookingStatus::Confirmed, BookingStatus::Cancelled)
            .await?
        {
            Some(booking) => {
                debug!(booking_id = %booking.booking_id, "Booking marked cancelled");
                Ok(booking)
            }
            None => Err(self.rejection(id, Booking::cancel).await),
        }
    }

    async fn mark_attended(&self, id: Uuid) -> Result<Booking, LedgerError> {
        match self
            .transition(id, BookingStatus::Confirmed, BookingStatus::Attended)
            .await?
        {
            Some(booking) => {
                debug!(booking_id = %booking.booking_id, "Booking marked attended");
                Ok(booking)
            }
            None => Err(self.rejection(id, Booking::attend).await),
        }
    }

    async fn claim_release(&self, id: Uuid) -> Result<Option<Booking>, LedgerError> {
        if let Some(booking) = self.set_released(id, false, true).await? {
            debug!(booking_id = %booking.booking_id, "Ticket release claimed");
            return Ok(Some(booking));
        }

        match self.find_by_id(id).await? {
            Some(booking) if booking.status == BookingStatus::Cancelled => Ok(None),
            Some(booking) => Err(LedgerError::InvalidTransition {
                from: booking.status.as_str(),
                to: BookingStatus::Cancelled.as_str(),
            }),
            None => Err(LedgerError::not_found(id)),
        }
    }

    async fn revert_release(&self, id: Uuid) -> Result<Booking, LedgerError> {
        if let Some(booking) = self.set_released(id, true, false).await? {
            debug!(booking_id = %booking.booking_id, "Ticket release claim reverted");
            return Ok(booking);
        }

        match self.find_by_id(id).await? {
            Some(booking) if booking.status == BookingStatus::Cancelled => Ok(booking),
            Some(booking) => Err(LedgerError::InvalidTransition {
                from: booking.status.as_str(),
                to: BookingStatus::Cancelled.as_str(),
            }),
            None => Err(LedgerError::not_found(id)),
        }
    }

    async fn list_pending_releases(&self, limit: i64) -> Result<Vec<Booking>, LedgerError> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            r#"
            SELECT {}
            FROM bookings
            WHERE status = $1 AND inventory_released = FALSE
            ORDER BY updated_at ASC
            LIMIT $2
            "#,
            BOOKING_COLUMNS
        ))
        .bind(BookingStatus::Cancelled.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Booking::try_from).collect()
    }
}
