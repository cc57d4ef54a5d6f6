use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// How a claimed payment was settled with the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_method", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Wallet,
    Cash,
    BankTransfer,
    Card,
    Upi,
}

/// Outcome of an individual settlement record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_state", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentState {
    Completed,
    Reversed,
}

/// One append-only settlement record against a booking.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PaymentRecord {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub transaction_ref: Option<String>,
    pub notes: Option<String>,
    pub state: PaymentState,
    pub recorded_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl PaymentRecord {
    pub fn completed(
        booking_id: Uuid,
        amount: Decimal,
        method: PaymentMethod,
        transaction_ref: Option<String>,
        notes: Option<String>,
        recorded_by: Uuid,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            booking_id,
            amount,
            method,
            transaction_ref,
            notes,
            state: PaymentState::Completed,
            recorded_by,
            created_at: Utc::now(),
        }
    }
}
