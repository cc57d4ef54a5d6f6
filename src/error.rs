use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::BookingStatus;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, AppError>;

/// Error taxonomy for the booking and settlement core.
///
/// Validation and authorization failures carry enough detail to render a
/// user-facing message. `SettlementInconsistency` is the one fatal class:
/// money moved without its paired record (or the outcome is ambiguous), so
/// automatic retry risks double-charging.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("invalid booking transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },

    #[error("booking {0} is locked in BOOKED status")]
    TerminalLock(String),

    #[error("booking {0} requires at least one supplier for this transition")]
    SupplierRequired(String),

    #[error("insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds {
        requested: Decimal,
        available: Decimal,
    },

    #[error("claim amount must be positive, got {0}")]
    InvalidAmount(Decimal),

    #[error("claim exceeds booking total: {remaining} remains claimable")]
    OverClaim { remaining: Decimal },

    #[error("booking {0} is already fully paid")]
    AlreadyPaid(String),

    #[error("concurrent modification of {0}, retry after re-reading")]
    ConcurrentModification(String),

    #[error("settlement inconsistency: {0}")]
    SettlementInconsistency(String),

    #[error("{0}")]
    Validation(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("configuration error: {0}")]
    Configuration(#[from] config::ConfigError),
}

impl AppError {
    /// True for errors that must page a human instead of being retried:
    /// a cross-entity operation may have partially completed.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AppError::SettlementInconsistency(_))
    }

    /// True for errors the caller may resolve by re-reading and retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::ConcurrentModification(_))
    }

    /// Returns true when the underlying database error is a unique
    /// constraint violation, used for reference-collision retries and the
    /// one-booking-per-quote backstop.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            AppError::Database(sqlx::Error::Database(db)) => {
                db.code().as_deref() == Some("23505")
            }
            _ => false,
        }
    }
}
