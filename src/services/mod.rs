pub mod booking_service;
pub mod claim_service;
pub mod quote_service;
pub mod wallet_service;

pub use booking_service::{
    BookingService, BookingStateMachine, CreateBookingRequest, SupplierInput, TransitionPayload,
};
pub use claim_service::{ClaimRequest, ClaimResult, ClaimService};
pub use quote_service::{derive_response_status, CreateQuoteRequest, QuoteService};
pub use wallet_service::{AdmissionCheck, WalletService};
