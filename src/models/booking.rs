use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::{AppError, Result};

/// Lifecycle status of a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "booking_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    /// Created, not yet picked up by operations.
    Pending,
    /// Operations is working the reservation.
    Processing,
    /// Reservation confirmed with the customer.
    Confirmed,
    /// Locked in with suppliers; terminal except for completion.
    Booked,
    /// Travel finished.
    Completed,
    /// Abandoned; reachable from any non-terminal state.
    Cancelled,
}

impl BookingStatus {
    /// Statuses with no outgoing transitions at all.
    pub fn is_final(&self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }

    /// BOOKED admits only forward movement to COMPLETED.
    pub fn is_terminal_locked(&self) -> bool {
        matches!(self, BookingStatus::Booked)
    }

    /// Statuses that require at least one supplier on record to enter.
    pub fn requires_supplier(&self) -> bool {
        matches!(self, BookingStatus::Booked | BookingStatus::Completed)
    }
}

/// Settlement status of a booking, derived from the claimed amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Unpaid,
    Partial,
    Paid,
    Refunded,
    Failed,
}

/// Tolerance when comparing claimed amount against the booking total.
/// Exact equality is never required; two cents of floating drift upstream
/// must still settle as fully paid.
pub fn payment_epsilon() -> Decimal {
    Decimal::new(1, 2) // 0.01
}

/// Derives the payment status from a claimed running total.
pub fn derive_payment_status(claimed: Decimal, total: Decimal) -> PaymentStatus {
    if claimed <= Decimal::ZERO {
        PaymentStatus::Unpaid
    } else if (total - claimed).abs() < payment_epsilon() {
        PaymentStatus::Paid
    } else {
        PaymentStatus::Partial
    }
}

/// A confirmed-or-pending reservation tied to money movement.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Booking {
    pub id: Uuid,
    /// Human-readable reference, `B<YY><MM>-<4 digits>`, unique.
    pub booking_ref: String,
    pub agent_id: Uuid,
    /// Set when this booking was materialized from a quote.
    pub quote_id: Option<Uuid>,
    /// Legacy string reference kept for pre-migration quote linkage.
    pub quote_ref: Option<String>,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub destination: String,
    pub travel_start: NaiveDate,
    pub travel_end: NaiveDate,
    pub adults: i32,
    pub children: i32,
    pub infants: i32,
    pub package_id: Option<Uuid>,
    pub package_price: Decimal,
    pub agent_price: Decimal,
    pub total_amount: Decimal,
    pub currency: String,
    pub booking_status: BookingStatus,
    pub payment_status: PaymentStatus,
    /// Running total of money claimed against this booking.
    pub claimed_amount: Decimal,
    pub itinerary: Option<String>,
    pub invoice_number: Option<String>,
    pub invoice_generated: bool,
    pub cancellation_reason: Option<String>,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Amount still claimable before hitting the booking total.
    pub fn remaining_claimable(&self) -> Decimal {
        self.total_amount - self.claimed_amount
    }

    /// True once the claimed total reaches the booking total (within ε).
    pub fn is_fully_paid(&self) -> bool {
        (self.total_amount - self.claimed_amount).abs() < payment_epsilon()
    }

    /// Validates a claim amount against this booking's current state and
    /// returns the new claimed running total. Mutates nothing.
    pub fn validate_claim(&self, amount: Decimal) -> Result<Decimal> {
        if amount <= Decimal::ZERO {
            return Err(AppError::InvalidAmount(amount));
        }
        if self.payment_status == PaymentStatus::Paid {
            return Err(AppError::AlreadyPaid(self.booking_ref.clone()));
        }

        let new_claimed = self.claimed_amount + amount;
        if new_claimed > self.total_amount {
            return Err(AppError::OverClaim {
                remaining: self.remaining_claimable(),
            });
        }

        Ok(new_claimed)
    }
}
