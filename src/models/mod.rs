pub mod actor;
pub mod booking;
pub mod package;
pub mod payment;
pub mod quote;
pub mod supplier;
pub mod wallet;

pub use actor::{Actor, Role};
pub use booking::{derive_payment_status, payment_epsilon, Booking, BookingStatus, PaymentStatus};
pub use package::TourPackage;
pub use payment::{PaymentMethod, PaymentRecord, PaymentState};
pub use quote::{MessageKind, Quote, QuoteMessage, QuoteStatus};
pub use supplier::{primary_supplier, SupplierAssignment};
pub use wallet::{Wallet, WalletEntryType, WalletTransaction};
