use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::{ParseEnumError, TransitionError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    Draft,
    Pending,
    Approved,
    Rejected,
    Published,
    Cancelled,
    Completed,
}

impl EventStatus {
    /// Statuses under which tickets may be reserved
    pub const BOOKABLE: [EventStatus; 2] = [EventStatus::Approved, EventStatus::Published];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Draft => "DRAFT",
            EventStatus::Pending => "PENDING",
            EventStatus::Approved => "APPROVED",
            EventStatus::Rejected => "REJECTED",
            EventStatus::Published => "PUBLISHED",
            EventStatus::Cancelled => "CANCELLED",
            EventStatus::Completed => "COMPLETED",
        }
    }

    pub fn is_bookable(&self) -> bool {
        Self::BOOKABLE.contains(self)
    }

    /// Statuses an admin sets when reviewing an event
    pub fn is_review_decision(&self) -> bool {
        matches!(
            self,
            EventStatus::Approved | EventStatus::Rejected | EventStatus::Published
        )
    }

    /// Review workflow: organizers submit, admins approve/reject/publish
    pub fn can_transition_to(&self, next: EventStatus) -> bool {
        use EventStatus::*;
        matches!(
            (self, next),
            (Draft, Pending)
                | (Draft, Cancelled)
                | (Pending, Approved)
                | (Pending, Rejected)
                | (Pending, Cancelled)
                | (Rejected, Pending)
                | (Approved, Published)
                | (Approved, Cancelled)
                | (Published, Cancelled)
                | (Published, Completed)
        )
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "DRAFT" => Ok(EventStatus::Draft),
            "PENDING" => Ok(EventStatus::Pending),
            "APPROVED" => Ok(EventStatus::Approved),
            "REJECTED" => Ok(EventStatus::Rejected),
            "PUBLISHED" => Ok(EventStatus::Published),
            "CANCELLED" => Ok(EventStatus::Cancelled),
            "COMPLETED" => Ok(EventStatus::Completed),
            _ => Err(ParseEnumError::new("event status", s)),
        }
    }
}

/// An inventory-bearing event.
///
/// `available_tickets` only moves through the inventory store's reserve/release
/// primitives; `0 <= available_tickets <= capacity` always holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub organizer_id: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub price: f64,
    pub capacity: i32,
    pub available_tickets: i32,
    pub status: EventStatus,
    /// Reviewer's note from the last approve/reject/publish decision
    pub feedback: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A requested status change with the reviewer's optional note
#[derive(Debug, Clone, PartialEq)]
pub struct EventReview {
    pub status: EventStatus,
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusCount {
    pub status: EventStatus,
    pub count: i64,
}

/// Admin overview of events by status
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventStats {
    pub event_stats: Vec<StatusCount>,
    pub organizer_count: i64,
    pub total_events: i64,
}

impl EventStats {
    pub fn new(mut event_stats: Vec<StatusCount>, organizer_count: i64) -> Self {
        event_stats.retain(|s| s.count > 0);
        event_stats.sort_by_key(|s| s.status.as_str());
        let total_events = event_stats.iter().map(|s| s.count).sum();
        Self {
            event_stats,
            organizer_count,
            total_events,
        }
    }
}

impl Event {
    /// Create a new event with its full capacity available
    pub fn new(
        title: String,
        organizer_id: Option<String>,
        starts_at: Option<DateTime<Utc>>,
        price: f64,
        capacity: i32,
        status: EventStatus,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title,
            organizer_id,
            starts_at,
            price,
            capacity,
            available_tickets: capacity,
            status,
            feedback: None,
            reviewed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn sold_tickets(&self) -> i32 {
        self.capacity - self.available_tickets
    }

    pub fn has_available(&self, quantity: u32) -> bool {
        i64::from(self.available_tickets) >= i64::from(quantity)
    }

    /// Subtract `quantity`; callers check bookability and availability first
    pub fn apply_reservation(&mut self, quantity: u32) {
        self.available_tickets -= quantity as i32;
        self.updated_at = Utc::now();
    }

    /// Add `quantity` back, never exceeding capacity
    pub fn apply_release(&mut self, quantity: u32) {
        let restored = i64::from(self.available_tickets) + i64::from(quantity);
        self.available_tickets = restored.min(i64::from(self.capacity)) as i32;
        self.updated_at = Utc::now();
    }

    pub fn transition_to(&mut self, next: EventStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError::Invalid {
                from: self.status.as_str(),
                to: next.as_str(),
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Apply a status change; review decisions also record feedback and time
    pub fn review(&mut self, review: &EventReview) -> Result<(), TransitionError> {
        self.transition_to(review.status)?;
        if review.status.is_review_decision() {
            self.feedback = review.feedback.clone();
            self.reviewed_at = Some(self.updated_at);
        }
        Ok(())
    }
}
