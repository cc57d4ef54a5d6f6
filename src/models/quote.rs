use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::Role;

/// Lifecycle status of a quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "quote_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuoteStatus {
    /// Opened by an agent, awaiting a response.
    Pending,
    /// Operations has priced or replied.
    Responded,
    /// Customer said yes; a booking must (eventually) exist.
    Accepted,
    /// Customer said no.
    Rejected,
    /// Aged out without a decision.
    Expired,
}

impl QuoteStatus {
    /// ACCEPTED and REJECTED freeze the quote except for discussion appends.
    pub fn is_closed(&self) -> bool {
        matches!(self, QuoteStatus::Accepted | QuoteStatus::Rejected)
    }
}

/// Author classification of a discussion entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "message_kind", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    Agent,
    Operations,
    System,
}

impl From<Role> for MessageKind {
    fn from(role: Role) -> Self {
        match role {
            Role::Agent => MessageKind::Agent,
            Role::Operations | Role::Admin => MessageKind::Operations,
        }
    }
}

/// A priced trip proposal awaiting a decision.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Quote {
    pub id: Uuid,
    /// Human-readable reference, `Q<YY><MM>-<4 digits>`, unique.
    pub quote_ref: String,
    pub agent_id: Uuid,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub destination: String,
    pub travel_start: Option<NaiveDate>,
    pub travel_end: Option<NaiveDate>,
    pub adults: i32,
    pub children: i32,
    pub status: QuoteStatus,
    pub quoted_price: Option<Decimal>,
    pub budget: Option<Decimal>,
    pub currency: String,
    pub itinerary: Option<String>,
    /// Back-reference set once a booking is materialized; at most one.
    pub booking_id: Option<Uuid>,
    pub lead_id: Option<Uuid>,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quote {
    /// Price a booking materialized from this quote should carry:
    /// the operations-quoted price, falling back to the customer budget.
    pub fn effective_price(&self) -> Option<Decimal> {
        self.quoted_price.or(self.budget)
    }

    /// Travel window for a materialized booking, defaulting to
    /// `[today, today + 7 days]` when the quote never fixed dates.
    pub fn travel_window(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        match (self.travel_start, self.travel_end) {
            (Some(start), Some(end)) => (start, end),
            (Some(start), None) => (start, start + Duration::days(7)),
            _ => (today, today + Duration::days(7)),
        }
    }
}

/// One append-only entry in a quote's discussion log.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QuoteMessage {
    pub id: Uuid,
    pub quote_id: Uuid,
    /// Nil for system entries.
    pub author_id: Option<Uuid>,
    pub kind: MessageKind,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl QuoteMessage {
    pub fn new(quote_id: Uuid, author_id: Uuid, kind: MessageKind, body: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            quote_id,
            author_id: Some(author_id),
            kind,
            body: body.into(),
            created_at: Utc::now(),
        }
    }

    /// System-authored entry recording a side effect outcome.
    pub fn system(quote_id: Uuid, body: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            quote_id,
            author_id: None,
            kind: MessageKind::System,
            body: body.into(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn quote() -> Quote {
        let now = Utc::now();
        Quote {
            id: Uuid::new_v4(),
            quote_ref: "Q2608-0042".to_string(),
            agent_id: Uuid::new_v4(),
            customer_name: "Meera Nair".to_string(),
            customer_email: "meera@example.com".to_string(),
            customer_phone: None,
            destination: "Coorg".to_string(),
            travel_start: None,
            travel_end: None,
            adults: 2,
            children: 1,
            status: QuoteStatus::Pending,
            quoted_price: None,
            budget: None,
            currency: "INR".to_string(),
            itinerary: None,
            booking_id: None,
            lead_id: None,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_closed_statuses() {
        assert!(QuoteStatus::Accepted.is_closed());
        assert!(QuoteStatus::Rejected.is_closed());
        assert!(!QuoteStatus::Pending.is_closed());
        assert!(!QuoteStatus::Responded.is_closed());
        assert!(!QuoteStatus::Expired.is_closed());
    }

    #[test]
    fn test_effective_price_prefers_quoted() {
        let mut q = quote();
        q.quoted_price = Some(dec!(45000));
        q.budget = Some(dec!(40000));
        assert_eq!(q.effective_price(), Some(dec!(45000)));
    }

    #[test]
    fn test_effective_price_falls_back_to_budget() {
        let mut q = quote();
        q.budget = Some(dec!(40000));
        assert_eq!(q.effective_price(), Some(dec!(40000)));

        q.budget = None;
        assert_eq!(q.effective_price(), None);
    }

    #[test]
    fn test_travel_window_defaults_to_week_from_today() {
        let q = quote();
        let today = NaiveDate::from_ymd_opt(2026, 8, 6).unwrap();
        let (start, end) = q.travel_window(today);
        assert_eq!(start, today);
        assert_eq!(end, NaiveDate::from_ymd_opt(2026, 8, 13).unwrap());
    }

    #[test]
    fn test_travel_window_uses_fixed_dates() {
        let mut q = quote();
        q.travel_start = NaiveDate::from_ymd_opt(2026, 10, 1);
        q.travel_end = NaiveDate::from_ymd_opt(2026, 10, 9);
        let today = NaiveDate::from_ymd_opt(2026, 8, 6).unwrap();
        assert_eq!(
            q.travel_window(today),
            (
                NaiveDate::from_ymd_opt(2026, 10, 1).unwrap(),
                NaiveDate::from_ymd_opt(2026, 10, 9).unwrap()
            )
        );
    }

    #[test]
    fn test_open_ended_start_gets_week_long_window() {
        let mut q = quote();
        q.travel_start = NaiveDate::from_ymd_opt(2026, 10, 1);
        let today = NaiveDate::from_ymd_opt(2026, 8, 6).unwrap();
        let (start, end) = q.travel_window(today);
        assert_eq!(start, NaiveDate::from_ymd_opt(2026, 10, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2026, 10, 8).unwrap());
    }

    #[test]
    fn test_message_kind_from_role() {
        assert_eq!(MessageKind::from(Role::Agent), MessageKind::Agent);
        assert_eq!(MessageKind::from(Role::Operations), MessageKind::Operations);
        assert_eq!(MessageKind::from(Role::Admin), MessageKind::Operations);
    }

    #[test]
    fn test_system_message_has_no_author() {
        let msg = QuoteMessage::system(Uuid::new_v4(), "booking B2608-0001 created");
        assert_eq!(msg.kind, MessageKind::System);
        assert!(msg.author_id.is_none());
    }
}
