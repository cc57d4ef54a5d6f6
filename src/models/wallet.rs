use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Direction of a wallet ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "wallet_entry_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WalletEntryType {
    /// Money leaving the wallet (booking funding, claim clawback).
    Debit,
    /// Money entering the wallet (top-up, claim reversal, commission payout).
    Credit,
}

impl WalletEntryType {
    /// Sign applied to the balance when the entry lands.
    pub fn sign(&self) -> i32 {
        match self {
            WalletEntryType::Debit => -1,
            WalletEntryType::Credit => 1,
        }
    }
}

/// An agent's prepaid wallet: the sole source of spendable funds.
///
/// `balance` is signed; the core never forces it negative through a
/// balance-only debit, but a funding debit admitted against the credit line
/// may legitimately take it below zero.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Wallet {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub balance: Decimal,
    pub credit_limit: Decimal,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    pub fn new(agent_id: Uuid, balance: Decimal, credit_limit: Decimal) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            agent_id,
            balance,
            credit_limit,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Funds available for a debit under the given admission policy.
    ///
    /// The credit line is honored only for the initial booking-funding
    /// debit; generic debits (claims) draw down the balance alone.
    pub fn available_funds(&self, allow_credit: bool) -> Decimal {
        if allow_credit {
            self.balance + self.credit_limit
        } else {
            self.balance
        }
    }

    /// Admission check: can this wallet fund `amount`?
    pub fn can_fund(&self, amount: Decimal, allow_credit: bool) -> bool {
        amount <= self.available_funds(allow_credit)
    }
}

/// One append-only entry in a wallet's transaction log.
///
/// Every balance mutation lands together with exactly one of these, in the
/// same storage transaction.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WalletTransaction {
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub entry_type: WalletEntryType,
    /// Always positive; direction is carried by `entry_type`.
    pub amount: Decimal,
    pub description: String,
    /// Human-readable reference of the entity that moved the money
    /// (booking ref, payment ref).
    pub reference: String,
    pub created_at: DateTime<Utc>,
}

impl WalletTransaction {
    pub fn debit(
        wallet_id: Uuid,
        amount: Decimal,
        description: impl Into<String>,
        reference: impl Into<String>,
    ) -> Self {
        Self::entry(wallet_id, WalletEntryType::Debit, amount, description, reference)
    }

    pub fn credit(
        wallet_id: Uuid,
        amount: Decimal,
        description: impl Into<String>,
        reference: impl Into<String>,
    ) -> Self {
        Self::entry(wallet_id, WalletEntryType::Credit, amount, description, reference)
    }

    fn entry(
        wallet_id: Uuid,
        entry_type: WalletEntryType,
        amount: Decimal,
        description: impl Into<String>,
        reference: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            wallet_id,
            entry_type,
            amount,
            description: description.into(),
            reference: reference.into(),
            created_at: Utc::now(),
        }
    }

    /// Signed effect of this entry on the wallet balance.
    pub fn signed_amount(&self) -> Decimal {
        match self.entry_type {
            WalletEntryType::Debit => -self.amount,
            WalletEntryType::Credit => self.amount,
        }
    }
}
