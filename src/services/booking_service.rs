use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::collaborators::PackageCatalog;
use crate::error::{AppError, Result};
use crate::idgen::{ReferenceGenerator, ReferenceKind, REFERENCE_RETRY_LIMIT};
use crate::models::{
    Actor, Booking, BookingStatus, PaymentMethod, PaymentRecord, PaymentStatus, Quote,
    SupplierAssignment,
};
use crate::repositories::{BookingRepository, WalletRepository};

/// State machine for booking status transitions.
///
/// BOOKED is deliberately absent from every backward edge: once a booking
/// is locked in with suppliers the only way forward is completion.
#[derive(Debug, Clone)]
pub struct BookingStateMachine;

impl BookingStateMachine {
    /// Returns valid next states from the current state.
    pub fn valid_transitions(current: BookingStatus) -> Vec<BookingStatus> {
        match current {
            BookingStatus::Pending => vec![
                BookingStatus::Processing,
                BookingStatus::Confirmed,
                BookingStatus::Cancelled,
            ],
            BookingStatus::Processing => {
                vec![BookingStatus::Confirmed, BookingStatus::Cancelled]
            }
            BookingStatus::Confirmed => vec![BookingStatus::Booked, BookingStatus::Cancelled],
            BookingStatus::Booked => vec![BookingStatus::Completed],
            BookingStatus::Completed => vec![],
            BookingStatus::Cancelled => vec![],
        }
    }

    pub fn can_transition(from: BookingStatus, to: BookingStatus) -> bool {
        Self::valid_transitions(from).contains(&to)
    }

    pub fn transition(from: BookingStatus, to: BookingStatus) -> Result<BookingStatus> {
        if Self::can_transition(from, to) {
            Ok(to)
        } else {
            Err(AppError::InvalidTransition { from, to })
        }
    }
}

/// Request to create a self-service, wallet-funded booking.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateBookingRequest {
    pub package_id: Uuid,
    #[validate(length(min = 1, message = "customer name is required"))]
    pub customer_name: String,
    #[validate(email(message = "customer email must be valid"))]
    pub customer_email: String,
    pub customer_phone: Option<String>,
    #[validate(length(min = 1, message = "destination is required"))]
    pub destination: String,
    pub travel_start: NaiveDate,
    pub travel_end: NaiveDate,
    #[validate(range(min = 1, message = "at least one adult traveler"))]
    pub adults: i32,
    #[validate(range(min = 0))]
    pub children: i32,
    #[validate(range(min = 0))]
    pub infants: i32,
    pub itinerary: Option<String>,
}

/// Supplier carried inside a status-transition payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplierInput {
    pub supplier_id: Uuid,
    pub notes: Option<String>,
}

/// Optional payload accompanying a status transition. Supplying suppliers
/// here is the only way to satisfy the BOOKED/COMPLETED precondition in
/// the same call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransitionPayload {
    pub suppliers: Vec<SupplierInput>,
    /// Honored for Admin actors only: releases the BOOKED terminal lock.
    pub admin_override: bool,
}

/// Owns booking creation, the status state machine, supplier assignment
/// rules, and invoice issuance.
pub struct BookingService {
    pool: PgPool,
    booking_repo: BookingRepository,
    wallet_repo: WalletRepository,
    catalog: Arc<dyn PackageCatalog>,
    refgen: ReferenceGenerator,
}

impl BookingService {
    pub fn new(pool: PgPool, catalog: Arc<dyn PackageCatalog>) -> Self {
        Self {
            booking_repo: BookingRepository::new(pool.clone()),
            wallet_repo: WalletRepository::new(pool.clone()),
            catalog,
            refgen: ReferenceGenerator::new(),
            pool,
        }
    }

    pub async fn get_booking(&self, booking_id: Uuid) -> Result<Booking> {
        self.booking_repo
            .find_by_id(booking_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Booking '{}' not found", booking_id)))
    }

    pub async fn list_suppliers(&self, booking_id: Uuid) -> Result<Vec<SupplierAssignment>> {
        self.booking_repo.list_suppliers(booking_id).await
    }

    /// Creates a wallet-funded booking for the acting agent.
    ///
    /// Booking insert, funding debit (credit line honored), wallet
    /// transaction append, and the settlement record land in one storage
    /// transaction; the booking is fully settled at creation, so later
    /// claims are rejected as already paid.
    pub async fn create_booking(&self, actor: &Actor, request: CreateBookingRequest) -> Result<Booking> {
        if actor.role != crate::models::Role::Agent {
            return Err(AppError::Forbidden(
                "self-service bookings are agent-funded; operations convert quotes instead".to_string(),
            ));
        }

        request
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        if request.travel_end < request.travel_start {
            return Err(AppError::Validation(
                "travel end date precedes start date".to_string(),
            ));
        }

        let package = self
            .catalog
            .get_package(request.package_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Package '{}' not found", request.package_id))
            })?;

        if !package.bookable() {
            return Err(AppError::Validation(format!(
                "Package '{}' is not active",
                package.name
            )));
        }

        // Advisory admission check; the conditional debit re-checks inside
        // the storage transaction.
        let wallet = self
            .wallet_repo
            .find_by_agent(actor.id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Wallet for agent '{}' not found", actor.id)))?;
        if !wallet.can_fund(package.agent_price, true) {
            return Err(AppError::InsufficientFunds {
                requested: package.agent_price,
                available: wallet.available_funds(true),
            });
        }

        let mut attempts = 0;
        loop {
            let booking_ref = self.refgen.generate(ReferenceKind::Booking);
            match self
                .create_funded(actor, &request, &package.price, &package.agent_price, &booking_ref)
                .await
            {
                Ok(booking) => {
                    info!(
                        booking = %booking.booking_ref,
                        agent = %actor.id,
                        amount = %package.agent_price,
                        "booking created and funded"
                    );
                    return Ok(booking);
                }
                Err(err) if err.is_unique_violation() && attempts < REFERENCE_RETRY_LIMIT => {
                    attempts += 1;
                    warn!(%booking_ref, attempts, "booking reference collision, regenerating");
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn create_funded(
        &self,
        actor: &Actor,
        request: &CreateBookingRequest,
        package_price: &Decimal,
        agent_price: &Decimal,
        booking_ref: &str,
    ) -> Result<Booking> {
        let now = Utc::now();
        let booking = Booking {
            id: Uuid::new_v4(),
            booking_ref: booking_ref.to_string(),
            agent_id: actor.id,
            quote_id: None,
            quote_ref: None,
            customer_name: request.customer_name.clone(),
            customer_email: request.customer_email.clone(),
            customer_phone: request.customer_phone.clone(),
            destination: request.destination.clone(),
            travel_start: request.travel_start,
            travel_end: request.travel_end,
            adults: request.adults,
            children: request.children,
            infants: request.infants,
            package_id: Some(request.package_id),
            package_price: *package_price,
            agent_price: *agent_price,
            total_amount: *agent_price,
            currency: "INR".to_string(),
            booking_status: BookingStatus::Pending,
            payment_status: PaymentStatus::Paid,
            claimed_amount: *agent_price,
            itinerary: request.itinerary.clone(),
            invoice_number: None,
            invoice_generated: false,
            cancellation_reason: None,
            version: 1,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;

        let created = self.booking_repo.create_in_tx(&mut tx, &booking).await?;

        self.wallet_repo
            .debit_in_tx(
                &mut tx,
                actor.id,
                *agent_price,
                true,
                "booking funding",
                booking_ref,
            )
            .await?;

        let settlement_ref = self.refgen.generate(ReferenceKind::WalletTxn);
        let payment = PaymentRecord::completed(
            created.id,
            *agent_price,
            PaymentMethod::Wallet,
            Some(settlement_ref),
            Some("funded from agent wallet at creation".to_string()),
            actor.id,
        );
        self.booking_repo.insert_payment_in_tx(&mut tx, &payment).await?;

        // Past this point the debit and the booking exist only together.
        // An ambiguous commit outcome is the one partial-completion hazard
        // left, and it must page a human rather than retry.
        tx.commit().await.map_err(|e| {
            AppError::SettlementInconsistency(format!(
                "booking {} and funding debit of {} did not commit cleanly: {}",
                booking_ref, agent_price, e
            ))
        })?;

        Ok(created)
    }

    /// Materializes a booking from an accepted quote.
    ///
    /// Quote-sourced bookings start CONFIRMED and unpaid: funding is
    /// settled later through payment claims, not a creation-time debit.
    /// The unique index on the quote link is the idempotency backstop —
    /// when two acceptances race, the loser re-reads the winner's booking.
    pub async fn materialize_from_quote(&self, quote: &Quote) -> Result<Booking> {
        let price = quote.effective_price().ok_or_else(|| {
            AppError::Validation(format!(
                "Quote '{}' carries neither a quoted price nor a budget",
                quote.quote_ref
            ))
        })?;

        let today = Utc::now().date_naive();
        let (travel_start, travel_end) = quote.travel_window(today);

        let mut attempts = 0;
        loop {
            let booking_ref = self.refgen.generate(ReferenceKind::Booking);
            let now = Utc::now();
            let booking = Booking {
                id: Uuid::new_v4(),
                booking_ref,
                agent_id: quote.agent_id,
                quote_id: Some(quote.id),
                quote_ref: Some(quote.quote_ref.clone()),
                customer_name: quote.customer_name.clone(),
                customer_email: quote.customer_email.clone(),
                customer_phone: quote.customer_phone.clone(),
                destination: quote.destination.clone(),
                travel_start,
                travel_end,
                adults: quote.adults,
                children: quote.children,
                infants: 0,
                package_id: None,
                package_price: price,
                agent_price: price,
                total_amount: price,
                currency: quote.currency.clone(),
                booking_status: BookingStatus::Confirmed,
                payment_status: PaymentStatus::Unpaid,
                claimed_amount: Decimal::ZERO,
                itinerary: quote.itinerary.clone(),
                invoice_number: None,
                invoice_generated: false,
                cancellation_reason: None,
                version: 1,
                created_at: now,
                updated_at: now,
            };

            match self.booking_repo.create(&booking).await {
                Ok(created) => {
                    info!(booking = %created.booking_ref, quote = %quote.quote_ref, "booking materialized from quote");
                    return Ok(created);
                }
                Err(err) if err.is_unique_violation() => {
                    // Either a concurrent acceptance won the quote link or
                    // the generated reference collided. Re-read settles which.
                    if let Some(existing) = self
                        .booking_repo
                        .find_by_quote(quote.id, &quote.quote_ref)
                        .await?
                    {
                        info!(
                            booking = %existing.booking_ref,
                            quote = %quote.quote_ref,
                            "concurrent acceptance already materialized this quote"
                        );
                        return Ok(existing);
                    }
                    attempts += 1;
                    if attempts > REFERENCE_RETRY_LIMIT {
                        return Err(err);
                    }
                    warn!(attempts, quote = %quote.quote_ref, "booking reference collision, regenerating");
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Finds the booking already materialized from a quote, matching both
    /// the canonical link and the legacy string reference.
    pub async fn find_for_quote(&self, quote: &Quote) -> Result<Option<Booking>> {
        self.booking_repo.find_by_quote(quote.id, &quote.quote_ref).await
    }

    /// Conversion-path helper: a booking left in an early status by a prior
    /// acceptance is advanced to CONFIRMED; anything further along is
    /// returned as-is.
    pub async fn advance_to_confirmed(&self, booking: &Booking) -> Result<Booking> {
        match booking.booking_status {
            BookingStatus::Pending | BookingStatus::Processing => {
                let updated = self
                    .booking_repo
                    .update_status(
                        booking.id,
                        booking.booking_status,
                        booking.version,
                        BookingStatus::Confirmed,
                    )
                    .await?;
                match updated {
                    Some(advanced) => Ok(advanced),
                    // Lost to a concurrent writer; the re-read is authoritative.
                    None => self.get_booking(booking.id).await,
                }
            }
            _ => Ok(booking.clone()),
        }
    }

    /// Applies a status transition with the state machine, terminal lock,
    /// and supplier preconditions. Suppliers in the payload are attached
    /// atomically with the transition.
    pub async fn transition_status(
        &self,
        booking_id: Uuid,
        new_status: BookingStatus,
        actor: &Actor,
        payload: TransitionPayload,
    ) -> Result<Booking> {
        if !actor.role.can_transition_booking() {
            return Err(AppError::Forbidden(format!(
                "role {:?} may not transition bookings",
                actor.role
            )));
        }

        let booking = self.get_booking(booking_id).await?;
        let current = booking.booking_status;

        if current == new_status {
            return Ok(booking);
        }

        // The override is scoped to the BOOKED lock; it never resurrects
        // completed or cancelled bookings.
        let overriding = payload.admin_override
            && actor.role.can_override_terminal_lock()
            && current.is_terminal_locked();

        if current.is_terminal_locked() && new_status != BookingStatus::Completed && !overriding {
            return Err(AppError::TerminalLock(booking.booking_ref.clone()));
        }

        if !overriding {
            BookingStateMachine::transition(current, new_status)?;
        }

        if new_status.requires_supplier() {
            let on_record = self.booking_repo.count_suppliers(booking_id).await?;
            if on_record == 0 && payload.suppliers.is_empty() {
                return Err(AppError::SupplierRequired(booking.booking_ref.clone()));
            }
        }

        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;

        for supplier in &payload.suppliers {
            let assignment = SupplierAssignment::new(
                booking_id,
                supplier.supplier_id,
                actor.id,
                supplier.notes.clone(),
            );
            self.booking_repo.add_supplier_in_tx(&mut tx, &assignment).await?;
        }

        let updated = self
            .booking_repo
            .update_status_in_tx(&mut tx, booking_id, current, booking.version, new_status)
            .await?
            .ok_or_else(|| AppError::ConcurrentModification(format!("booking {}", booking.booking_ref)))?;

        tx.commit().await.map_err(AppError::Database)?;

        if overriding {
            warn!(
                booking = %updated.booking_ref,
                admin = %actor.id,
                from = ?current,
                to = ?new_status,
                "terminal lock overridden"
            );
        } else {
            info!(booking = %updated.booking_ref, from = ?current, to = ?new_status, "booking status updated");
        }

        Ok(updated)
    }

    /// Attaches suppliers outside a status transition.
    pub async fn assign_suppliers(
        &self,
        booking_id: Uuid,
        actor: &Actor,
        suppliers: Vec<SupplierInput>,
    ) -> Result<Vec<SupplierAssignment>> {
        if !actor.role.can_assign_suppliers() {
            return Err(AppError::Forbidden(format!(
                "role {:?} may not assign suppliers",
                actor.role
            )));
        }
        if suppliers.is_empty() {
            return Err(AppError::Validation("no suppliers given".to_string()));
        }

        let booking = self.get_booking(booking_id).await?;

        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;
        for supplier in &suppliers {
            let assignment = SupplierAssignment::new(
                booking_id,
                supplier.supplier_id,
                actor.id,
                supplier.notes.clone(),
            );
            self.booking_repo.add_supplier_in_tx(&mut tx, &assignment).await?;
        }
        tx.commit().await.map_err(AppError::Database)?;

        info!(booking = %booking.booking_ref, count = suppliers.len(), "suppliers assigned");
        self.booking_repo.list_suppliers(booking_id).await
    }

    /// Cancels a booking: owners (agents) and operations staff only, never
    /// out of BOOKED or a final state.
    pub async fn cancel(&self, booking_id: Uuid, actor: &Actor, reason: &str) -> Result<Booking> {
        let booking = self.get_booking(booking_id).await?;

        if !actor.role.can_cancel_any_booking() && !actor.owns(booking.agent_id) {
            return Err(AppError::Forbidden(format!(
                "agent {} does not own booking {}",
                actor.id, booking.booking_ref
            )));
        }

        let current = booking.booking_status;
        if current.is_terminal_locked() {
            return Err(AppError::TerminalLock(booking.booking_ref.clone()));
        }
        if current.is_final() {
            return Err(AppError::InvalidTransition {
                from: current,
                to: BookingStatus::Cancelled,
            });
        }

        let cancelled = self
            .booking_repo
            .cancel(booking_id, current, booking.version, reason)
            .await?
            .ok_or_else(|| AppError::ConcurrentModification(format!("booking {}", booking.booking_ref)))?;

        info!(booking = %cancelled.booking_ref, reason, "booking cancelled");
        Ok(cancelled)
    }

    /// Issues an invoice number. Re-invocation regenerates a fresh number
    /// over the old one; upstream behavior, kept until product decides
    /// whether re-issue is intended.
    pub async fn record_invoice(&self, booking_id: Uuid) -> Result<String> {
        let booking = self.get_booking(booking_id).await?;

        let invoice_number = self.refgen.generate(ReferenceKind::Invoice);
        self.booking_repo.set_invoice(booking_id, &invoice_number).await?;

        info!(booking = %booking.booking_ref, invoice = %invoice_number, "invoice recorded");
        Ok(invoice_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_machine_forward_paths() {
        assert!(BookingStateMachine::can_transition(
            BookingStatus::Pending,
            BookingStatus::Processing
        ));
        assert!(BookingStateMachine::can_transition(
            BookingStatus::Pending,
            BookingStatus::Confirmed
        ));
        assert!(BookingStateMachine::can_transition(
            BookingStatus::Processing,
            BookingStatus::Confirmed
        ));
        assert!(BookingStateMachine::can_transition(
            BookingStatus::Confirmed,
            BookingStatus::Booked
        ));
        assert!(BookingStateMachine::can_transition(
            BookingStatus::Booked,
            BookingStatus::Completed
        ));
    }

    #[test]
    fn test_state_machine_cancellation_paths() {
        assert!(BookingStateMachine::can_transition(
            BookingStatus::Pending,
            BookingStatus::Cancelled
        ));
        assert!(BookingStateMachine::can_transition(
            BookingStatus::Processing,
            BookingStatus::Cancelled
        ));
        assert!(BookingStateMachine::can_transition(
            BookingStatus::Confirmed,
            BookingStatus::Cancelled
        ));
        // BOOKED cannot be cancelled, only completed.
        assert!(!BookingStateMachine::can_transition(
            BookingStatus::Booked,
            BookingStatus::Cancelled
        ));
    }

    #[test]
    fn test_state_machine_booked_never_regresses() {
        for status in [
            BookingStatus::Pending,
            BookingStatus::Processing,
            BookingStatus::Confirmed,
            BookingStatus::Cancelled,
        ] {
            assert!(!BookingStateMachine::can_transition(BookingStatus::Booked, status));
        }
    }

    #[test]
    fn test_state_machine_final_states_are_dead_ends() {
        assert!(BookingStateMachine::valid_transitions(BookingStatus::Completed).is_empty());
        assert!(BookingStateMachine::valid_transitions(BookingStatus::Cancelled).is_empty());
    }

    #[test]
    fn test_state_machine_no_status_skipping() {
        assert!(!BookingStateMachine::can_transition(
            BookingStatus::Pending,
            BookingStatus::Booked
        ));
        assert!(!BookingStateMachine::can_transition(
            BookingStatus::Processing,
            BookingStatus::Booked
        ));
        assert!(!BookingStateMachine::can_transition(
            BookingStatus::Pending,
            BookingStatus::Completed
        ));
    }

    #[test]
    fn test_transition_error_carries_both_states() {
        let err = BookingStateMachine::transition(BookingStatus::Booked, BookingStatus::Pending)
            .unwrap_err();
        match err {
            AppError::InvalidTransition { from, to } => {
                assert_eq!(from, BookingStatus::Booked);
                assert_eq!(to, BookingStatus::Pending);
            }
            other => panic!("expected InvalidTransition, got {:?}", other),
        }
    }

    #[test]
    fn test_create_request_validation() {
        let valid = CreateBookingRequest {
            package_id: Uuid::new_v4(),
            customer_name: "Asha Verma".to_string(),
            customer_email: "asha@example.com".to_string(),
            customer_phone: None,
            destination: "Leh".to_string(),
            travel_start: NaiveDate::from_ymd_opt(2026, 9, 10).unwrap(),
            travel_end: NaiveDate::from_ymd_opt(2026, 9, 17).unwrap(),
            adults: 2,
            children: 0,
            infants: 0,
            itinerary: None,
        };
        assert!(valid.validate().is_ok());

        let mut missing_name = valid.clone();
        missing_name.customer_name = String::new();
        assert!(missing_name.validate().is_err());

        let mut bad_email = valid.clone();
        bad_email.customer_email = "not-an-email".to_string();
        assert!(bad_email.validate().is_err());

        let mut no_adults = valid;
        no_adults.adults = 0;
        assert!(no_adults.validate().is_err());
    }

    #[test]
    fn test_transition_payload_default_is_empty() {
        let payload = TransitionPayload::default();
        assert!(payload.suppliers.is_empty());
        assert!(!payload.admin_override);
    }
}
