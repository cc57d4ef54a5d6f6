use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{
    Booking, BookingStatus, PaymentRecord, PaymentStatus, SupplierAssignment,
};

const BOOKING_COLUMNS: &str = "id, booking_ref, agent_id, quote_id, quote_ref, customer_name, \
     customer_email, customer_phone, destination, travel_start, travel_end, adults, children, \
     infants, package_id, package_price, agent_price, total_amount, currency, booking_status, \
     payment_status, claimed_amount, itinerary, invoice_number, invoice_generated, \
     cancellation_reason, version, created_at, updated_at";

/// Repository for bookings, their supplier assignments, and their
/// append-only settlement records.
///
/// Status and claim mutations are conditional updates keyed on the state
/// the caller observed; zero rows affected means a concurrent writer won.
pub struct BookingRepository {
    pool: PgPool,
}

impl BookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, booking: &Booking) -> Result<Booking> {
        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;
        let created = self.create_in_tx(&mut tx, booking).await?;
        tx.commit().await.map_err(AppError::Database)?;
        Ok(created)
    }

    /// Inserts a booking inside an already-open storage transaction.
    ///
    /// Unique violations (booking_ref collision, second booking for one
    /// quote) propagate as database errors; callers decide whether to
    /// regenerate the reference or re-read the winner.
    pub async fn create_in_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        booking: &Booking,
    ) -> Result<Booking> {
        let sql = format!(
            "INSERT INTO bookings ({BOOKING_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, \
             $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29) \
             RETURNING {BOOKING_COLUMNS}"
        );

        let row = sqlx::query_as::<_, Booking>(&sql)
            .bind(booking.id)
            .bind(&booking.booking_ref)
            .bind(booking.agent_id)
            .bind(booking.quote_id)
            .bind(&booking.quote_ref)
            .bind(&booking.customer_name)
            .bind(&booking.customer_email)
            .bind(&booking.customer_phone)
            .bind(&booking.destination)
            .bind(booking.travel_start)
            .bind(booking.travel_end)
            .bind(booking.adults)
            .bind(booking.children)
            .bind(booking.infants)
            .bind(booking.package_id)
            .bind(booking.package_price)
            .bind(booking.agent_price)
            .bind(booking.total_amount)
            .bind(&booking.currency)
            .bind(booking.booking_status)
            .bind(booking.payment_status)
            .bind(booking.claimed_amount)
            .bind(&booking.itinerary)
            .bind(&booking.invoice_number)
            .bind(booking.invoice_generated)
            .bind(&booking.cancellation_reason)
            .bind(booking.version)
            .bind(booking.created_at)
            .bind(booking.updated_at)
            .fetch_one(&mut **tx)
            .await
            .map_err(AppError::Database)?;

        Ok(row)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>> {
        let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1");
        let row = sqlx::query_as::<_, Booking>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)?;

        Ok(row)
    }

    pub async fn find_by_ref(&self, booking_ref: &str) -> Result<Option<Booking>> {
        let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE booking_ref = $1");
        let row = sqlx::query_as::<_, Booking>(&sql)
            .bind(booking_ref)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)?;

        Ok(row)
    }

    /// Finds the booking materialized from a quote, matching both the
    /// canonical uuid link and the legacy string reference carried over
    /// from pre-migration data.
    pub async fn find_by_quote(
        &self,
        quote_id: Uuid,
        quote_ref: &str,
    ) -> Result<Option<Booking>> {
        let sql = format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE quote_id = $1 OR quote_ref = $2"
        );
        let row = sqlx::query_as::<_, Booking>(&sql)
            .bind(quote_id)
            .bind(quote_ref)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)?;

        Ok(row)
    }

    /// Moves a booking to a new status, guarded by the status and version
    /// the caller observed. Returns None on a concurrent modification.
    pub async fn update_status(
        &self,
        id: Uuid,
        expected: BookingStatus,
        expected_version: i32,
        new_status: BookingStatus,
    ) -> Result<Option<Booking>> {
        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;
        let updated = self
            .update_status_in_tx(&mut tx, id, expected, expected_version, new_status)
            .await?;
        tx.commit().await.map_err(AppError::Database)?;
        Ok(updated)
    }

    pub async fn update_status_in_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        id: Uuid,
        expected: BookingStatus,
        expected_version: i32,
        new_status: BookingStatus,
    ) -> Result<Option<Booking>> {
        let sql = format!(
            "UPDATE bookings \
             SET booking_status = $4, version = version + 1, updated_at = NOW() \
             WHERE id = $1 AND booking_status = $2 AND version = $3 \
             RETURNING {BOOKING_COLUMNS}"
        );
        let row = sqlx::query_as::<_, Booking>(&sql)
            .bind(id)
            .bind(expected)
            .bind(expected_version)
            .bind(new_status)
            .fetch_optional(&mut **tx)
            .await
            .map_err(AppError::Database)?;

        Ok(row)
    }

    /// Cancels a booking, guarded like a status update, recording the reason.
    pub async fn cancel(
        &self,
        id: Uuid,
        expected: BookingStatus,
        expected_version: i32,
        reason: &str,
    ) -> Result<Option<Booking>> {
        let sql = format!(
            "UPDATE bookings \
             SET booking_status = $4, cancellation_reason = $5, version = version + 1, \
                 updated_at = NOW() \
             WHERE id = $1 AND booking_status = $2 AND version = $3 \
             RETURNING {BOOKING_COLUMNS}"
        );
        let row = sqlx::query_as::<_, Booking>(&sql)
            .bind(id)
            .bind(expected)
            .bind(expected_version)
            .bind(BookingStatus::Cancelled)
            .bind(reason)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)?;

        Ok(row)
    }

    pub async fn set_invoice(&self, id: Uuid, invoice_number: &str) -> Result<Booking> {
        let sql = format!(
            "UPDATE bookings \
             SET invoice_number = $2, invoice_generated = TRUE, version = version + 1, \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {BOOKING_COLUMNS}"
        );
        let row = sqlx::query_as::<_, Booking>(&sql)
            .bind(id)
            .bind(invoice_number)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)?;

        row.ok_or_else(|| AppError::NotFound(format!("Booking '{}' not found", id)))
    }

    /// Applies a claim: advances the claimed running total and the derived
    /// payment status, guarded by the claimed amount the caller validated
    /// against. Zero rows means another claim landed first.
    pub async fn apply_claim_in_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        id: Uuid,
        expected_claimed: Decimal,
        new_claimed: Decimal,
        payment_status: PaymentStatus,
    ) -> Result<Option<Booking>> {
        let sql = format!(
            "UPDATE bookings \
             SET claimed_amount = $3, payment_status = $4, version = version + 1, \
                 updated_at = NOW() \
             WHERE id = $1 AND claimed_amount = $2 \
             RETURNING {BOOKING_COLUMNS}"
        );
        let row = sqlx::query_as::<_, Booking>(&sql)
            .bind(id)
            .bind(expected_claimed)
            .bind(new_claimed)
            .bind(payment_status)
            .fetch_optional(&mut **tx)
            .await
            .map_err(AppError::Database)?;

        Ok(row)
    }

    pub async fn insert_payment_in_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        payment: &PaymentRecord,
    ) -> Result<PaymentRecord> {
        let row = sqlx::query_as::<_, PaymentRecord>(
            r#"
            INSERT INTO booking_payments (id, booking_id, amount, method, transaction_ref, notes, state, recorded_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, booking_id, amount, method, transaction_ref, notes, state, recorded_by, created_at
            "#,
        )
        .bind(payment.id)
        .bind(payment.booking_id)
        .bind(payment.amount)
        .bind(payment.method)
        .bind(&payment.transaction_ref)
        .bind(&payment.notes)
        .bind(payment.state)
        .bind(payment.recorded_by)
        .bind(payment.created_at)
        .fetch_one(&mut **tx)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    pub async fn find_payment(&self, payment_id: Uuid) -> Result<Option<PaymentRecord>> {
        let row = sqlx::query_as::<_, PaymentRecord>(
            r#"
            SELECT id, booking_id, amount, method, transaction_ref, notes, state, recorded_by, created_at
            FROM booking_payments
            WHERE id = $1
            "#,
        )
        .bind(payment_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    /// Flips a settlement record's state, guarded by the state the caller
    /// observed.
    pub async fn set_payment_state_in_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        payment_id: Uuid,
        expected: crate::models::PaymentState,
        new_state: crate::models::PaymentState,
    ) -> Result<Option<PaymentRecord>> {
        let row = sqlx::query_as::<_, PaymentRecord>(
            r#"
            UPDATE booking_payments
            SET state = $3
            WHERE id = $1 AND state = $2
            RETURNING id, booking_id, amount, method, transaction_ref, notes, state, recorded_by, created_at
            "#,
        )
        .bind(payment_id)
        .bind(expected)
        .bind(new_state)
        .fetch_optional(&mut **tx)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    pub async fn list_payments(&self, booking_id: Uuid) -> Result<Vec<PaymentRecord>> {
        let rows = sqlx::query_as::<_, PaymentRecord>(
            r#"
            SELECT id, booking_id, amount, method, transaction_ref, notes, state, recorded_by, created_at
            FROM booking_payments
            WHERE booking_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(rows)
    }

    pub async fn add_supplier_in_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        assignment: &SupplierAssignment,
    ) -> Result<SupplierAssignment> {
        let row = sqlx::query_as::<_, SupplierAssignment>(
            r#"
            INSERT INTO booking_suppliers (id, booking_id, supplier_id, assigned_by, notes, assigned_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (booking_id, supplier_id) DO UPDATE SET notes = EXCLUDED.notes
            RETURNING id, booking_id, supplier_id, assigned_by, notes, assigned_at
            "#,
        )
        .bind(assignment.id)
        .bind(assignment.booking_id)
        .bind(assignment.supplier_id)
        .bind(assignment.assigned_by)
        .bind(&assignment.notes)
        .bind(assignment.assigned_at)
        .fetch_one(&mut **tx)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    pub async fn list_suppliers(&self, booking_id: Uuid) -> Result<Vec<SupplierAssignment>> {
        let rows = sqlx::query_as::<_, SupplierAssignment>(
            r#"
            SELECT id, booking_id, supplier_id, assigned_by, notes, assigned_at
            FROM booking_suppliers
            WHERE booking_id = $1
            ORDER BY assigned_at
            "#,
        )
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(rows)
    }

    pub async fn count_suppliers(&self, booking_id: Uuid) -> Result<i64> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM booking_suppliers WHERE booking_id = $1")
                .bind(booking_id)
                .fetch_one(&self.pool)
                .await
                .map_err(AppError::Database)?;

        Ok(count.0)
    }
}
