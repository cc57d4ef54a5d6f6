use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{Quote, QuoteMessage, QuoteStatus};

const QUOTE_COLUMNS: &str = "id, quote_ref, agent_id, customer_name, customer_email, \
     customer_phone, destination, travel_start, travel_end, adults, children, status, \
     quoted_price, budget, currency, itinerary, booking_id, lead_id, version, created_at, \
     updated_at";

/// Repository for quotes and their append-only discussion log.
pub struct QuoteRepository {
    pool: PgPool,
}

impl QuoteRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, quote: &Quote) -> Result<Quote> {
        let sql = format!(
            "INSERT INTO quotes ({QUOTE_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, \
             $18, $19, $20, $21) \
             RETURNING {QUOTE_COLUMNS}"
        );

        let row = sqlx::query_as::<_, Quote>(&sql)
            .bind(quote.id)
            .bind(&quote.quote_ref)
            .bind(quote.agent_id)
            .bind(&quote.customer_name)
            .bind(&quote.customer_email)
            .bind(&quote.customer_phone)
            .bind(&quote.destination)
            .bind(quote.travel_start)
            .bind(quote.travel_end)
            .bind(quote.adults)
            .bind(quote.children)
            .bind(quote.status)
            .bind(quote.quoted_price)
            .bind(quote.budget)
            .bind(&quote.currency)
            .bind(&quote.itinerary)
            .bind(quote.booking_id)
            .bind(quote.lead_id)
            .bind(quote.version)
            .bind(quote.created_at)
            .bind(quote.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::Database)?;

        Ok(row)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Quote>> {
        let sql = format!("SELECT {QUOTE_COLUMNS} FROM quotes WHERE id = $1");
        let row = sqlx::query_as::<_, Quote>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)?;

        Ok(row)
    }

    pub async fn find_by_ref(&self, quote_ref: &str) -> Result<Option<Quote>> {
        let sql = format!("SELECT {QUOTE_COLUMNS} FROM quotes WHERE quote_ref = $1");
        let row = sqlx::query_as::<_, Quote>(&sql)
            .bind(quote_ref)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)?;

        Ok(row)
    }

    /// Moves a quote to a new status, guarded by the status the caller
    /// observed. Returns None when a concurrent writer got there first.
    pub async fn update_status(
        &self,
        id: Uuid,
        expected: QuoteStatus,
        new_status: QuoteStatus,
    ) -> Result<Option<Quote>> {
        let sql = format!(
            "UPDATE quotes \
             SET status = $3, version = version + 1, updated_at = NOW() \
             WHERE id = $1 AND status = $2 \
             RETURNING {QUOTE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, Quote>(&sql)
            .bind(id)
            .bind(expected)
            .bind(new_status)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)?;

        Ok(row)
    }

    /// Records the accepted decision and the booking back-reference in one
    /// statement, keeping the at-most-one-booking invariant visible.
    pub async fn mark_accepted(&self, id: Uuid, booking_id: Uuid) -> Result<Quote> {
        let sql = format!(
            "UPDATE quotes \
             SET status = $3, booking_id = $2, version = version + 1, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {QUOTE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, Quote>(&sql)
            .bind(id)
            .bind(booking_id)
            .bind(QuoteStatus::Accepted)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)?;

        row.ok_or_else(|| AppError::NotFound(format!("Quote '{}' not found", id)))
    }

    /// Sets the operations-quoted price on an open quote.
    pub async fn set_quoted_price(
        &self,
        id: Uuid,
        quoted_price: rust_decimal::Decimal,
    ) -> Result<Quote> {
        let sql = format!(
            "UPDATE quotes \
             SET quoted_price = $2, version = version + 1, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {QUOTE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, Quote>(&sql)
            .bind(id)
            .bind(quoted_price)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)?;

        row.ok_or_else(|| AppError::NotFound(format!("Quote '{}' not found", id)))
    }

    pub async fn append_message(&self, message: &QuoteMessage) -> Result<QuoteMessage> {
        let row = sqlx::query_as::<_, QuoteMessage>(
            r#"
            INSERT INTO quote_messages (id, quote_id, author_id, kind, body, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, quote_id, author_id, kind, body, created_at
            "#,
        )
        .bind(message.id)
        .bind(message.quote_id)
        .bind(message.author_id)
        .bind(message.kind)
        .bind(&message.body)
        .bind(message.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    pub async fn list_messages(&self, quote_id: Uuid) -> Result<Vec<QuoteMessage>> {
        let rows = sqlx::query_as::<_, QuoteMessage>(
            r#"
            SELECT id, quote_id, author_id, kind, body, created_at
            FROM quote_messages
            WHERE quote_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(quote_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(rows)
    }
}
