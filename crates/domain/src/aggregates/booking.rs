use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::{ParseEnumError, TransitionError, ValidationFailure};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
    Attended,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Attended => "attended",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "confirmed" => Ok(BookingStatus::Confirmed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            "attended" => Ok(BookingStatus::Attended),
            _ => Err(ParseEnumError::new("booking status", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Wallet,
    Esewa,
    Khalti,
    CreditCard,
    DebitCard,
    Paypal,
    BankTransfer,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 7] = [
        PaymentMethod::Wallet,
        PaymentMethod::Esewa,
        PaymentMethod::Khalti,
        PaymentMethod::CreditCard,
        PaymentMethod::DebitCard,
        PaymentMethod::Paypal,
        PaymentMethod::BankTransfer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Wallet => "wallet",
            PaymentMethod::Esewa => "esewa",
            PaymentMethod::Khalti => "khalti",
            PaymentMethod::CreditCard => "credit_card",
            PaymentMethod::DebitCard => "debit_card",
            PaymentMethod::Paypal => "paypal",
            PaymentMethod::BankTransfer => "bank_transfer",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        PaymentMethod::ALL
            .into_iter()
            .find(|m| m.as_str() == normalized)
            .ok_or_else(|| ParseEnumError::new("payment method", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(PaymentStatus::Pending),
            "completed" => Ok(PaymentStatus::Completed),
            "failed" => Ok(PaymentStatus::Failed),
            "refunded" => Ok(PaymentStatus::Refunded),
            _ => Err(ParseEnumError::new("payment status", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInfo {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub address: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInfo {
    pub method: PaymentMethod,
    pub transaction_id: String,
    pub status: PaymentStatus,
    pub paid_at: DateTime<Utc>,
}

/// Everything the ledger needs to record a booking once inventory is reserved
#[derive(Debug, Clone, PartialEq)]
pub struct BookingDraft {
    pub event_id: Uuid,
    pub customer: CustomerInfo,
    pub ticket_count: u32,
    pub total_amount: f64,
    pub payment_method: PaymentMethod,
}

impl BookingDraft {
    /// Field checks the ledger enforces regardless of who calls it
    pub fn validate(&self) -> Result<(), ValidationFailure> {
        let mut failure = ValidationFailure::new();
        if self.ticket_count < 1 {
            failure.push("ticketCount", "Ticket count must be at least 1");
        }
        if self.ticket_count > i32::MAX as u32 {
            failure.push("ticketCount", "Ticket count is too large");
        }
        if self.customer.full_name.trim().is_empty() {
            failure.push("customerInfo.fullName", "Full name is required");
        }
        if self.customer.email.trim().is_empty() {
            failure.push("customerInfo.email", "Email is required");
        }
        if self.customer.phone.trim().is_empty() {
            failure.push("customerInfo.phone", "Phone number is required");
        }
        if self.total_amount < 0.0 || !self.total_amount.is_finite() {
            failure.push("totalAmount", "Total amount must be a non-negative number");
        }
        failure.into_result()
    }
}

/// A ledger entry: `ticket_count` tickets drawn from one event's inventory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: Uuid,
    pub booking_id: String,
    pub event_id: Uuid,
    pub customer: CustomerInfo,
    pub ticket_count: i32,
    pub total_amount: f64,
    pub payment: PaymentInfo,
    pub status: BookingStatus,
    pub inventory_released: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Materialize a confirmed booking with freshly generated identifiers.
    ///
    /// Payment is recorded as completed immediately; there is no gateway round trip.
    pub fn from_draft(draft: BookingDraft) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            booking_id: generate_booking_code(),
            event_id: draft.event_id,
            customer: draft.customer,
            ticket_count: draft.ticket_count as i32,
            total_amount: draft.total_amount,
            payment: PaymentInfo {
                method: draft.payment_method,
                transaction_id: generate_transaction_id(),
                status: PaymentStatus::Completed,
                paid_at: now,
            },
            status: BookingStatus::Confirmed,
            inventory_released: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Confirmed and attended bookings count against the event's capacity
    pub fn holds_inventory(&self) -> bool {
        matches!(self.status, BookingStatus::Confirmed | BookingStatus::Attended)
    }

    pub fn needs_release(&self) -> bool {
        self.status == BookingStatus::Cancelled && !self.inventory_released
    }

    pub fn cancel(&mut self) -> Result<(), TransitionError> {
        match self.status {
            BookingStatus::Confirmed => {
                self.status = BookingStatus::Cancelled;
                self.updated_at = Utc::now();
                Ok(())
            }
            BookingStatus::Cancelled => Err(TransitionError::AlreadyCancelled),
            BookingStatus::Attended => Err(TransitionError::Invalid {
                from: BookingStatus::Attended.as_str(),
                to: BookingStatus::Cancelled.as_str(),
            }),
        }
    }

    pub fn attend(&mut self) -> Result<(), TransitionError> {
        match self.status {
            BookingStatus::Confirmed => {
                self.status = BookingStatus::Attended;
                self.updated_at = Utc::now();
                Ok(())
            }
            other => Err(TransitionError::Invalid {
                from: other.as_str(),
                to: BookingStatus::Attended.as_str(),
            }),
        }
    }
}

/// Human-readable booking reference, e.g. `BK3F9A0C21D7`
pub fn generate_booking_code() -> String {
    let raw = Uuid::new_v4().simple().to_string().to_uppercase();
    format!("BK{}", &raw[..10])
}

pub fn generate_transaction_id() -> String {
    let raw = Uuid::new_v4().simple().to_string().to_uppercase();
    format!("TXN{}", &raw[..12])
}
