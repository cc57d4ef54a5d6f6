use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{Wallet, WalletTransaction};
use crate::repositories::WalletRepository;

/// Outcome of a funds-availability test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionCheck {
    pub available_funds: Decimal,
}

/// Owns wallet admission checks, debit/credit application, and the
/// transaction-log pairing guarantee.
///
/// The credit line is honored only through [`apply_funding_debit`]; every
/// other debit draws down the balance alone, so a wallet left negative by a
/// credit-funded booking rejects further generic debits.
pub struct WalletService {
    wallet_repo: WalletRepository,
}

impl WalletService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            wallet_repo: WalletRepository::new(pool),
        }
    }

    pub async fn get_wallet(&self, agent_id: Uuid) -> Result<Wallet> {
        self.wallet_repo
            .find_by_agent(agent_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Wallet for agent '{}' not found", agent_id)))
    }

    /// Funds-availability test preceding any debit. Advisory only: the
    /// repository re-checks inside the conditional update, so a stale read
    /// here can never double-spend.
    pub async fn check_admission(
        &self,
        agent_id: Uuid,
        amount: Decimal,
        allow_credit: bool,
    ) -> Result<AdmissionCheck> {
        let wallet = self.get_wallet(agent_id).await?;
        let available_funds = wallet.available_funds(allow_credit);

        if amount > available_funds {
            return Err(AppError::InsufficientFunds {
                requested: amount,
                available: available_funds,
            });
        }

        Ok(AdmissionCheck { available_funds })
    }

    /// Generic debit: balance-only admission, no credit line.
    pub async fn apply_debit(
        &self,
        agent_id: Uuid,
        amount: Decimal,
        description: &str,
        reference: &str,
    ) -> Result<WalletTransaction> {
        if amount <= Decimal::ZERO {
            return Err(AppError::Validation("Debit amount must be positive".to_string()));
        }

        let entry = self
            .wallet_repo
            .debit(agent_id, amount, false, description, reference)
            .await?;

        info!(agent = %agent_id, %amount, reference, "wallet debited");
        Ok(entry)
    }

    /// Initial booking-funding debit: admission against balance + credit
    /// limit, the only path that may take the balance below zero.
    pub async fn apply_funding_debit(
        &self,
        agent_id: Uuid,
        amount: Decimal,
        description: &str,
        reference: &str,
    ) -> Result<WalletTransaction> {
        if amount <= Decimal::ZERO {
            return Err(AppError::Validation("Debit amount must be positive".to_string()));
        }

        let entry = self
            .wallet_repo
            .debit(agent_id, amount, true, description, reference)
            .await?;

        info!(agent = %agent_id, %amount, reference, "wallet debited against credit line");
        Ok(entry)
    }

    /// Credit: claim reversal or commission payout.
    pub async fn apply_credit(
        &self,
        agent_id: Uuid,
        amount: Decimal,
        description: &str,
        reference: &str,
    ) -> Result<WalletTransaction> {
        if amount <= Decimal::ZERO {
            return Err(AppError::Validation("Credit amount must be positive".to_string()));
        }

        let entry = self
            .wallet_repo
            .credit(agent_id, amount, description, reference)
            .await?;

        info!(agent = %agent_id, %amount, reference, "wallet credited");
        Ok(entry)
    }

    pub async fn transaction_history(
        &self,
        agent_id: Uuid,
        limit: i64,
    ) -> Result<Vec<WalletTransaction>> {
        let wallet = self.get_wallet(agent_id).await?;
        self.wallet_repo.list_transactions(wallet.id, limit).await
    }
}
