use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::aggregates::booking::{CustomerInfo, PaymentMethod};
use crate::errors::ValidationFailure;

/// Command to book tickets for an event, as received at the API boundary
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BookTicketsCommand {
    pub event_id: Uuid,

    #[validate(nested)]
    pub customer_info: CustomerInfoInput,

    #[validate(range(min = 1, max = 2147483647, message = "Ticket count must be at least 1"))]
    pub ticket_count: i64,

    pub payment_method: String,

    #[serde(default)]
    pub user_id: Option<String>,
}

/// Customer details supplied with a booking
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInfoInput {
    #[validate(length(min = 1, message = "Full name is required"))]
    pub full_name: String,

    #[validate(email(message = "A valid email address is required"))]
    pub email: String,

    #[validate(length(min = 1, message = "Phone number is required"))]
    pub phone: String,

    #[serde(default)]
    pub address: Option<String>,
}

/// A booking request that passed validation; safe to hand to storage
#[derive(Debug, Clone, PartialEq)]
pub struct TicketRequest {
    pub event_id: Uuid,
    pub customer: CustomerInfo,
    pub ticket_count: u32,
    pub payment_method: PaymentMethod,
}

impl BookTicketsCommand {
    /// Normalize and validate, collecting every field problem at once
    pub fn into_request(self) -> Result<TicketRequest, ValidationFailure> {
        let trimmed = self.trimmed();

        let mut failure = match trimmed.validate() {
            Ok(()) => ValidationFailure::new(),
            Err(errors) => ValidationFailure::from_validator(&errors),
        };

        let payment_method = match trimmed.payment_method.parse::<PaymentMethod>() {
            Ok(method) => Some(method),
            Err(_) => {
                let allowed = PaymentMethod::ALL
                    .iter()
                    .map(|m| m.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                failure.push(
                    "paymentMethod",
                    format!(
                        "Unknown payment method '{}'. Must be one of: {}",
                        trimmed.payment_method, allowed
                    ),
                );
                None
            }
        };

        failure.into_result()?;

        let ticket_count = u32::try_from(trimmed.ticket_count)
            .map_err(|_| ValidationFailure::single("ticketCount", "Ticket count is out of range"))?;
        let payment_method = payment_method
            .ok_or_else(|| ValidationFailure::single("paymentMethod", "Payment method is required"))?;

        Ok(TicketRequest {
            event_id: trimmed.event_id,
            customer: CustomerInfo {
                full_name: trimmed.customer_info.full_name,
                email: trimmed.customer_info.email,
                phone: trimmed.customer_info.phone,
                address: trimmed.customer_info.address.filter(|a| !a.is_empty()),
                user_id: trimmed.user_id.filter(|u| !u.is_empty()),
            },
            ticket_count,
            payment_method,
        })
    }

    fn trimmed(self) -> Self {
        Self {
            event_id: self.event_id,
            customer_info: CustomerInfoInput {
                full_name: self.customer_info.full_name.trim().to_string(),
                email: self.customer_info.email.trim().to_string(),
                phone: self.customer_info.phone.trim().to_string(),
                address: self.customer_info.address.map(|a| a.trim().to_string()),
            },
            ticket_count: self.ticket_count,
            payment_method: self.payment_method.trim().to_string(),
            user_id: self.user_id.map(|u| u.trim().to_string()),
        }
    }
}
