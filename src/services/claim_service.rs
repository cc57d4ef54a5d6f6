use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{
    derive_payment_status, Actor, Booking, PaymentMethod, PaymentRecord, PaymentState,
    WalletTransaction,
};
use crate::repositories::{BookingRepository, WalletRepository};

/// Request to reconcile a partial or full payment against a booking.
#[derive(Debug, Clone, Deserialize)]
pub struct ClaimRequest {
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub transaction_ref: Option<String>,
    pub notes: Option<String>,
}

/// Everything a successful claim produced.
#[derive(Debug, Clone, Serialize)]
pub struct ClaimResult {
    pub booking: Booking,
    pub payment: PaymentRecord,
    pub wallet_transaction: WalletTransaction,
}

/// Owns partial-payment claims: validates the claimable remainder, moves
/// the money out of the agent wallet, and re-derives the booking's payment
/// status — all in one storage transaction.
///
/// Claims debit the agent's wallet (operations reclaiming the agent's
/// margin). That reading of "claim" is carried over from the upstream
/// system unchanged; see DESIGN.md before building on it.
pub struct ClaimService {
    pool: PgPool,
    booking_repo: BookingRepository,
    wallet_repo: WalletRepository,
}

impl ClaimService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            booking_repo: BookingRepository::new(pool.clone()),
            wallet_repo: WalletRepository::new(pool.clone()),
            pool,
        }
    }

    pub async fn claim_payment(
        &self,
        booking_id: Uuid,
        actor: &Actor,
        request: ClaimRequest,
    ) -> Result<ClaimResult> {
        if !actor.role.can_claim_payment() {
            return Err(AppError::Forbidden(format!(
                "role {:?} may not claim payments",
                actor.role
            )));
        }

        let booking = self
            .booking_repo
            .find_by_id(booking_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Booking '{}' not found", booking_id)))?;

        let new_claimed = booking.validate_claim(request.amount)?;

        // Advisory admission check, balance only: claims never draw on the
        // credit line. The conditional debit re-checks inside the
        // transaction below.
        let wallet = self
            .wallet_repo
            .find_by_agent(booking.agent_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Wallet for agent '{}' not found", booking.agent_id))
            })?;
        if !wallet.can_fund(request.amount, false) {
            return Err(AppError::InsufficientFunds {
                requested: request.amount,
                available: wallet.available_funds(false),
            });
        }

        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;

        let wallet_transaction = self
            .wallet_repo
            .debit_in_tx(
                &mut tx,
                booking.agent_id,
                request.amount,
                false,
                "payment claim",
                &booking.booking_ref,
            )
            .await?;

        let payment_status = derive_payment_status(new_claimed, booking.total_amount);
        let updated = self
            .booking_repo
            .apply_claim_in_tx(
                &mut tx,
                booking.id,
                booking.claimed_amount,
                new_claimed,
                payment_status,
            )
            .await?
            .ok_or_else(|| {
                // Another claim advanced the running total first. The open
                // transaction rolls back with the debit still uncommitted,
                // so no money has moved.
                AppError::ConcurrentModification(format!("booking {}", booking.booking_ref))
            })?;

        let payment = PaymentRecord::completed(
            booking.id,
            request.amount,
            request.method,
            request.transaction_ref.clone(),
            request.notes.clone(),
            actor.id,
        );
        let payment = self.booking_repo.insert_payment_in_tx(&mut tx, &payment).await?;

        // The debit, the claim advance, and the settlement record exist
        // only together; an ambiguous commit outcome means money may have
        // moved without its paired records and must page a human.
        tx.commit().await.map_err(|e| {
            AppError::SettlementInconsistency(format!(
                "claim of {} against booking {} did not commit cleanly: {}",
                request.amount, booking.booking_ref, e
            ))
        })?;

        info!(
            booking = %updated.booking_ref,
            amount = %request.amount,
            claimed = %updated.claimed_amount,
            status = ?updated.payment_status,
            "payment claimed"
        );

        Ok(ClaimResult {
            booking: updated,
            payment,
            wallet_transaction,
        })
    }

    /// Reverses a settled claim: the compensating action when a recorded
    /// payment turns out to be wrong. Returns the money to the agent
    /// wallet, rolls the claimed running total back, and re-derives the
    /// payment status, atomically with flipping the record to REVERSED.
    pub async fn reverse_claim(
        &self,
        booking_id: Uuid,
        actor: &Actor,
        payment_id: Uuid,
        reason: &str,
    ) -> Result<ClaimResult> {
        if !actor.role.can_claim_payment() {
            return Err(AppError::Forbidden(format!(
                "role {:?} may not reverse claims",
                actor.role
            )));
        }

        let booking = self
            .booking_repo
            .find_by_id(booking_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Booking '{}' not found", booking_id)))?;

        let payment = self
            .booking_repo
            .find_payment(payment_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Payment '{}' not found", payment_id)))?;

        if payment.booking_id != booking.id {
            return Err(AppError::Validation(format!(
                "payment {} does not belong to booking {}",
                payment_id, booking.booking_ref
            )));
        }
        if payment.state != PaymentState::Completed {
            return Err(AppError::Validation(format!(
                "payment {} is already reversed",
                payment_id
            )));
        }

        let new_claimed = booking.claimed_amount - payment.amount;
        if new_claimed < Decimal::ZERO {
            return Err(AppError::Validation(format!(
                "reversal of {} would take booking {} below zero claimed",
                payment.amount, booking.booking_ref
            )));
        }

        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;

        let wallet_transaction = self
            .wallet_repo
            .credit_in_tx(
                &mut tx,
                booking.agent_id,
                payment.amount,
                &format!("claim reversal: {}", reason),
                &booking.booking_ref,
            )
            .await?;

        let payment_status = derive_payment_status(new_claimed, booking.total_amount);
        let updated = self
            .booking_repo
            .apply_claim_in_tx(
                &mut tx,
                booking.id,
                booking.claimed_amount,
                new_claimed,
                payment_status,
            )
            .await?
            .ok_or_else(|| {
                AppError::ConcurrentModification(format!("booking {}", booking.booking_ref))
            })?;

        let payment = self
            .booking_repo
            .set_payment_state_in_tx(&mut tx, payment.id, PaymentState::Completed, PaymentState::Reversed)
            .await?
            .ok_or_else(|| {
                AppError::ConcurrentModification(format!("payment {}", payment_id))
            })?;

        tx.commit().await.map_err(|e| {
            AppError::SettlementInconsistency(format!(
                "reversal of {} against booking {} did not commit cleanly: {}",
                payment.amount, booking.booking_ref, e
            ))
        })?;

        info!(
            booking = %updated.booking_ref,
            payment = %payment.id,
            amount = %payment.amount,
            reason,
            "claim reversed"
        );

        Ok(ClaimResult {
            booking: updated,
            payment,
            wallet_transaction,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use rust_decimal_macros::dec;

    fn service() -> ClaimService {
        let pool = PgPool::connect_lazy("postgres://localhost/booking_engine_unit").unwrap();
        ClaimService::new(pool)
    }

    #[tokio::test]
    async fn test_agents_may_not_claim() {
        let svc = service();
        let agent = Actor::new(Uuid::new_v4(), "Priya", Role::Agent);
        let request = ClaimRequest {
            amount: dec!(400),
            method: PaymentMethod::BankTransfer,
            transaction_ref: None,
            notes: None,
        };

        let result = svc.claim_payment(Uuid::new_v4(), &agent, request).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }
}
