pub mod booking_repository;
pub mod quote_repository;
pub mod wallet_repository;

pub use booking_repository::BookingRepository;
pub use quote_repository::QuoteRepository;
pub use wallet_repository::WalletRepository;

use sqlx::PgPool;

/// Database connection pool type alias.
pub type DbPool = PgPool;
