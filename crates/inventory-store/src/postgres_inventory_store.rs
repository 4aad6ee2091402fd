use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{Event, EventReview, EventStats, EventStatus, StatusCount};
use sqlx::{FromRow, PgPool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{classify_rejection, InventoryError, InventoryStore};

const EVENT_COLUMNS: &str = "id, title, organizer_id, starts_at, price, capacity, \
                             available_tickets, status, feedback, reviewed_at, \
                             created_at, updated_at";

#[derive(Debug, FromRow)]
struct EventRow {
    id: Uuid,
    title: String,
    organizer_id: Option<String>,
    starts_at: Option<DateTime<Utc>>,
    price: f64,
    capacity: i32,
    available_tickets: i32,
    status: String,
    feedback: Option<String>,
    reviewed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct StatusCountRow {
    status: String,
    count: i64,
}

impl TryFrom<EventRow> for Event {
    type Error = InventoryError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<EventStatus>()
            .map_err(|e| InventoryError::CorruptRecord(format!("event {}: {}", row.id, e)))?;

        Ok(Event {
            id: row.id,
            title: row.title,
            organizer_id: row.organizer_id,
            starts_at: row.starts_at,
            price: row.price,
            capacity: row.capacity,
            available_tickets: row.available_tickets,
            status,
            feedback: row.feedback,
            reviewed_at: row.reviewed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// PostgreSQL implementation of the inventory store.
///
/// Reservations are one conditional `UPDATE ... RETURNING`: the row lock taken
/// by the update serializes concurrent reservations on the same event, and the
/// `WHERE` clause is re-evaluated against the committed row, so two requests
/// can never both take the last ticket.
pub struct PostgresInventoryStore {
    pool: PgPool,
}

impl PostgresInventoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the database pool (useful for testing)
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch(&self, event_id: Uuid) -> Result<Option<Event>, InventoryError> {
        let row = sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {} FROM ticketed_events WHERE id = $1",
            EVENT_COLUMNS
        ))
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Event::try_from).transpose()
    }
}

fn bookable_statuses() -> Vec<String> {
    EventStatus::BOOKABLE
        .iter()
        .map(|s| s.as_str().to_string())
        .collect()
}

#[async_trait]
impl InventoryStore for PostgresInventoryStore {
    async fn insert(&self, event: &Event) -> Result<(), InventoryError> {
        let result = sqlx::query(
            r#"
            INSERT INTO ticketed_events (
                id, title, organizer_id, starts_at, price, capacity,
                available_tickets, status, feedback, reviewed_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(event.id)
        .bind(&event.title)
        .bind(&event.organizer_id)
        .bind(event.starts_at)
        .bind(event.price)
        .bind(event.capacity)
        .bind(event.available_tickets)
        .bind(event.status.as_str())
        .bind(&event.feedback)
        .bind(event.reviewed_at)
        .bind(event.created_at)
        .bind(event.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                info!(event_id = %event.id, capacity = event.capacity, "Event inserted");
                Ok(())
            }
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(InventoryError::DuplicateEvent(event.id))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_id(&self, event_id: Uuid) -> Result<Option<Event>, InventoryError> {
        self.fetch(event_id).await
    }

    async fn list(
        &self,
        status: Option<EventStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Event>, InventoryError> {
        let rows = sqlx::query_as::<_, EventRow>(&format!(
            r#"
            SELECT {}
            FROM ticketed_events
            WHERE ($1::TEXT IS NULL OR status = $1)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
            EVENT_COLUMNS
        ))
        .bind(status.map(|s| s.as_str()))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Event::try_from).collect()
    }

    async fn reserve(&self, event_id: Uuid, quantity: u32) -> Result<Event, InventoryError> {
        let Ok(amount) = i32::try_from(quantity) else {
            let available = self
                .fetch(event_id)
                .await?
                .ok_or(InventoryError::EventNotFound(event_id))?
                .available_tickets;
            return Err(InventoryError::InsufficientInventory {
                event_id,
                requested: quantity,
                available,
            });
        };

        let row = sqlx::query_as::<_, EventRow>(&format!(
            r#"
            UPDATE ticketed_events
            SET available_tickets = available_tickets - $2, updated_at = NOW()
            WHERE id = $1 AND available_tickets >= $2 AND status = ANY($3)
            RETURNING {}
            "#,
            EVENT_COLUMNS
        ))
        .bind(event_id)
        .bind(amount)
        .bind(bookable_statuses())
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            let event = Event::try_from(row)?;
            debug!(
                event_id = %event_id,
                quantity,
                available = event.available_tickets,
                "Reserved tickets"
            );
            return Ok(event);
        }

        // The update matched nothing; read the row only to explain why.
        let current = self
            .fetch(event_id)
            .await?
            .ok_or(InventoryError::EventNotFound(event_id))?;

        let rejection = classify_rejection(&current, quantity).unwrap_or(
            // Condition failed at commit time but holds again now (a concurrent release)
            InventoryError::InsufficientInventory {
                event_id,
                requested: quantity,
                available: current.available_tickets,
            },
        );
        debug!(event_id = %event_id, quantity, reason = %rejection, "Reservation rejected");
        Err(rejection)
    }

    async fn release(&self, event_id: Uuid, quantity: u32) -> Result<Event, InventoryError> {
        let amount = i32::try_from(quantity).unwrap_or(i32::MAX);

        let row = sqlx::query_as::<_, EventRow>(&format!(
            r#"
            UPDATE ticketed_events
            SET available_tickets = LEAST(capacity, available_tickets + $2), updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            EVENT_COLUMNS
        ))
        .bind(event_id)
        .bind(amount)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(InventoryError::EventNotFound(event_id))?;

        let event = Event::try_from(row)?;
        debug!(
            event_id = %event_id,
            quantity,
            available = event.available_tickets,
            "Released tickets"
        );
        Ok(event)
    }

    async fn update_status(
        &self,
        event_id: Uuid,
        review: &EventReview,
    ) -> Result<Event, InventoryError> {
        let status = review.status;
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {} FROM ticketed_events WHERE id = $1 FOR UPDATE",
            EVENT_COLUMNS
        ))
        .bind(event_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(InventoryError::EventNotFound(event_id))?;

        let mut event = Event::try_from(row)?;
        let previous = event.status;
        if let Err(e) = event.review(review) {
            warn!(event_id = %event_id, from = %previous, to = %status, "Rejected status change");
            return Err(e.into());
        }

        sqlx::query(
            r#"
            UPDATE ticketed_events
            SET status = $2, feedback = $3, reviewed_at = $4, updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(event_id)
        .bind(event.status.as_str())
        .bind(&event.feedback)
        .bind(event.reviewed_at)
        .bind(event.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(event_id = %event_id, from = %previous, to = %status, "Event status updated");
        Ok(event)
    }

    async fn stats(&self) -> Result<EventStats, InventoryError> {
        let rows = sqlx::query_as::<_, StatusCountRow>(
            "SELECT status, COUNT(*) AS count FROM ticketed_events GROUP BY status",
        )
        .fetch_all(&self.pool)
        .await?;

        let organizer_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(DISTINCT organizer_id) FROM ticketed_events",
        )
        .fetch_one(&self.pool)
        .await?;

        let by_status = rows
            .into_iter()
            .map(|row| {
                let status = row.status.parse::<EventStatus>().map_err(|e| {
                    InventoryError::CorruptRecord(format!("status count: {}", e))
                })?;
                Ok(StatusCount {
                    status,
                    count: row.count,
                })
            })
            .collect::<Result<Vec<_>, InventoryError>>()?;

        Ok(EventStats::new(by_status, organizer_count))
    }
}
