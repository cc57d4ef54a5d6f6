use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{Wallet, WalletEntryType, WalletTransaction};

/// Repository for agent wallets and their append-only transaction log.
///
/// Balance mutation and transaction append always travel in one storage
/// transaction: there is no code path that applies one without the other.
pub struct WalletRepository {
    pool: PgPool,
}

impl WalletRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Provisions a wallet. Wallet creation is an onboarding concern; the
    /// core only needs this for setup and tests.
    pub async fn create(&self, wallet: &Wallet) -> Result<Wallet> {
        let row = sqlx::query_as::<_, Wallet>(
            r#"
            INSERT INTO wallets (id, agent_id, balance, credit_limit, version, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, agent_id, balance, credit_limit, version, created_at, updated_at
            "#,
        )
        .bind(wallet.id)
        .bind(wallet.agent_id)
        .bind(wallet.balance)
        .bind(wallet.credit_limit)
        .bind(wallet.version)
        .bind(wallet.created_at)
        .bind(wallet.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    pub async fn find_by_agent(&self, agent_id: Uuid) -> Result<Option<Wallet>> {
        let row = sqlx::query_as::<_, Wallet>(
            r#"
            SELECT id, agent_id, balance, credit_limit, version, created_at, updated_at
            FROM wallets
            WHERE agent_id = $1
            "#,
        )
        .bind(agent_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    /// Applies a debit as a single conditional read-modify-write.
    ///
    /// The admission re-check lives inside the UPDATE itself, so two
    /// concurrent debits can never both pass on a stale balance read. When
    /// `allow_credit` is set the guard admits up to `balance + credit_limit`
    /// (booking-funding path); otherwise balance only.
    pub async fn debit(
        &self,
        agent_id: Uuid,
        amount: Decimal,
        allow_credit: bool,
        description: &str,
        reference: &str,
    ) -> Result<WalletTransaction> {
        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;

        let wallet = sqlx::query_as::<_, Wallet>(
            r#"
            UPDATE wallets
            SET balance = balance - $2,
                version = version + 1,
                updated_at = NOW()
            WHERE agent_id = $1
              AND balance + CASE WHEN $3 THEN credit_limit ELSE 0 END >= $2
            RETURNING id, agent_id, balance, credit_limit, version, created_at, updated_at
            "#,
        )
        .bind(agent_id)
        .bind(amount)
        .bind(allow_credit)
        .fetch_optional(&mut *tx)
        .await
        .map_err(AppError::Database)?;

        let wallet = match wallet {
            Some(wallet) => wallet,
            None => {
                // The guard failed: distinguish a missing wallet from an
                // admission failure and report the funds actually available.
                let existing = self.find_by_agent(agent_id).await?;
                return match existing {
                    None => Err(AppError::NotFound(format!(
                        "Wallet for agent '{}' not found",
                        agent_id
                    ))),
                    Some(wallet) => Err(AppError::InsufficientFunds {
                        requested: amount,
                        available: wallet.available_funds(allow_credit),
                    }),
                };
            }
        };

        let entry = self
            .append_entry(
                &mut tx,
                wallet.id,
                WalletEntryType::Debit,
                amount,
                description,
                reference,
            )
            .await?;

        // A commit failure here is ambiguous: the debit and its log entry
        // may or may not have landed. Surface it loudly instead of as a
        // generic storage error.
        tx.commit().await.map_err(|e| {
            AppError::SettlementInconsistency(format!(
                "wallet debit of {} for agent {} did not commit cleanly: {}",
                amount, agent_id, e
            ))
        })?;

        Ok(entry)
    }

    /// Applies a credit together with its transaction append.
    pub async fn credit(
        &self,
        agent_id: Uuid,
        amount: Decimal,
        description: &str,
        reference: &str,
    ) -> Result<WalletTransaction> {
        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;

        let wallet = sqlx::query_as::<_, Wallet>(
            r#"
            UPDATE wallets
            SET balance = balance + $2,
                version = version + 1,
                updated_at = NOW()
            WHERE agent_id = $1
            RETURNING id, agent_id, balance, credit_limit, version, created_at, updated_at
            "#,
        )
        .bind(agent_id)
        .bind(amount)
        .fetch_optional(&mut *tx)
        .await
        .map_err(AppError::Database)?
        .ok_or_else(|| AppError::NotFound(format!("Wallet for agent '{}' not found", agent_id)))?;

        let entry = self
            .append_entry(
                &mut tx,
                wallet.id,
                WalletEntryType::Credit,
                amount,
                description,
                reference,
            )
            .await?;

        tx.commit().await.map_err(|e| {
            AppError::SettlementInconsistency(format!(
                "wallet credit of {} for agent {} did not commit cleanly: {}",
                amount, agent_id, e
            ))
        })?;

        Ok(entry)
    }

    /// Variant of [`credit`] that joins an already-open storage transaction,
    /// used when the credit must be atomic with booking writes (claim
    /// reversal).
    pub async fn credit_in_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        agent_id: Uuid,
        amount: Decimal,
        description: &str,
        reference: &str,
    ) -> Result<WalletTransaction> {
        let wallet = sqlx::query_as::<_, Wallet>(
            r#"
            UPDATE wallets
            SET balance = balance + $2,
                version = version + 1,
                updated_at = NOW()
            WHERE agent_id = $1
            RETURNING id, agent_id, balance, credit_limit, version, created_at, updated_at
            "#,
        )
        .bind(agent_id)
        .bind(amount)
        .fetch_optional(&mut **tx)
        .await
        .map_err(AppError::Database)?
        .ok_or_else(|| AppError::NotFound(format!("Wallet for agent '{}' not found", agent_id)))?;

        self.append_entry(
            tx,
            wallet.id,
            WalletEntryType::Credit,
            amount,
            description,
            reference,
        )
        .await
    }

    /// Variant of [`debit`] that joins an already-open storage transaction,
    /// used when the debit must be atomic with booking writes.
    pub async fn debit_in_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        agent_id: Uuid,
        amount: Decimal,
        allow_credit: bool,
        description: &str,
        reference: &str,
    ) -> Result<WalletTransaction> {
        let wallet = sqlx::query_as::<_, Wallet>(
            r#"
            UPDATE wallets
            SET balance = balance - $2,
                version = version + 1,
                updated_at = NOW()
            WHERE agent_id = $1
              AND balance + CASE WHEN $3 THEN credit_limit ELSE 0 END >= $2
            RETURNING id, agent_id, balance, credit_limit, version, created_at, updated_at
            "#,
        )
        .bind(agent_id)
        .bind(amount)
        .bind(allow_credit)
        .fetch_optional(&mut **tx)
        .await
        .map_err(AppError::Database)?;

        let wallet = match wallet {
            Some(wallet) => wallet,
            None => {
                let existing = self.find_by_agent(agent_id).await?;
                return match existing {
                    None => Err(AppError::NotFound(format!(
                        "Wallet for agent '{}' not found",
                        agent_id
                    ))),
                    Some(wallet) => Err(AppError::InsufficientFunds {
                        requested: amount,
                        available: wallet.available_funds(allow_credit),
                    }),
                };
            }
        };

        self.append_entry(
            tx,
            wallet.id,
            WalletEntryType::Debit,
            amount,
            description,
            reference,
        )
        .await
    }

    pub async fn list_transactions(
        &self,
        wallet_id: Uuid,
        limit: i64,
    ) -> Result<Vec<WalletTransaction>> {
        let rows = sqlx::query_as::<_, WalletTransaction>(
            r#"
            SELECT id, wallet_id, entry_type, amount, description, reference, created_at
            FROM wallet_transactions
            WHERE wallet_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(wallet_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(rows)
    }

    async fn append_entry(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        wallet_id: Uuid,
        entry_type: WalletEntryType,
        amount: Decimal,
        description: &str,
        reference: &str,
    ) -> Result<WalletTransaction> {
        let entry = match entry_type {
            WalletEntryType::Debit => {
                WalletTransaction::debit(wallet_id, amount, description, reference)
            }
            WalletEntryType::Credit => {
                WalletTransaction::credit(wallet_id, amount, description, reference)
            }
        };

        let row = sqlx::query_as::<_, WalletTransaction>(
            r#"
            INSERT INTO wallet_transactions (id, wallet_id, entry_type, amount, description, reference, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, wallet_id, entry_type, amount, description, reference, created_at
            "#,
        )
        .bind(entry.id)
        .bind(entry.wallet_id)
        .bind(entry.entry_type)
        .bind(entry.amount)
        .bind(&entry.description)
        .bind(&entry.reference)
        .bind(entry.created_at)
        .fetch_one(&mut **tx)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }
}
