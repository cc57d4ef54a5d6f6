mod common;

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sqlx::PgPool;
use uuid::Uuid;

use booking_engine::collaborators::{LeadStatus, LeadTracker, NullNotifier};
use booking_engine::error::AppError;
use booking_engine::models::{BookingStatus, MessageKind, PaymentStatus, QuoteStatus};
use booking_engine::services::{BookingService, CreateQuoteRequest, QuoteService};

fn quote_request(budget: Decimal) -> CreateQuoteRequest {
    CreateQuoteRequest {
        customer_name: "Meera Nair".to_string(),
        customer_email: "meera@example.com".to_string(),
        customer_phone: None,
        destination: "Coorg".to_string(),
        travel_start: None,
        travel_end: None,
        adults: 2,
        children: 1,
        budget: Some(budget),
        lead_id: None,
        itinerary: Some("Day 1: plantation stay".to_string()),
    }
}

fn build_services(pool: &PgPool, lead_tracker: Arc<dyn LeadTracker>) -> (Arc<BookingService>, QuoteService) {
    let catalog = Arc::new(common::FixtureCatalog::new());
    let booking_service = Arc::new(BookingService::new(pool.clone(), catalog));
    let quote_service = QuoteService::new(
        pool.clone(),
        booking_service.clone(),
        lead_tracker,
        Arc::new(NullNotifier),
    );
    (booking_service, quote_service)
}

#[tokio::test]
#[ignore = "Requires running Postgres"]
async fn test_agent_accepted_response_creates_booking() {
    let pool = common::setup_test_db().await;
    let agent = common::agent("Priya");
    let ops = common::operations("Desk");
    let lead_tracker = Arc::new(common::RecordingLeadTracker::new());
    let (_, service) = build_services(&pool, lead_tracker.clone());

    let quote = service.create_quote(&agent, quote_request(dec!(40000))).await.unwrap();
    assert_eq!(quote.status, QuoteStatus::Pending);
    assert!(quote.quote_ref.starts_with('Q'));

    let priced = service.price_quote(quote.id, &ops, dec!(45000)).await.unwrap();
    assert_eq!(priced.quoted_price, Some(dec!(45000)));

    // Scenario C: the exact word "accepted" from the owning agent decides.
    let decided = service
        .respond_to_quote(quote.id, &agent, "accepted", None)
        .await
        .unwrap();
    assert_eq!(decided.status, QuoteStatus::Accepted);
    let booking_id = decided.booking_id.expect("booking back-reference set");

    let booking = booking_engine::repositories::BookingRepository::new(pool.clone())
        .find_by_id(booking_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(booking.quote_id, Some(quote.id));
    assert_eq!(booking.booking_status, BookingStatus::Confirmed);
    // Quote-sourced bookings settle later through claims.
    assert_eq!(booking.payment_status, PaymentStatus::Unpaid);
    assert_eq!(booking.claimed_amount, Decimal::ZERO);
    // The operations price wins over the budget.
    assert_eq!(booking.total_amount, dec!(45000));
    assert_eq!(booking.itinerary.as_deref(), Some("Day 1: plantation stay"));

    // Default travel window: a week starting today.
    let today = Utc::now().date_naive();
    assert_eq!(booking.travel_start, today);
    assert_eq!(booking.travel_end, today + chrono::Duration::days(7));
}

#[tokio::test]
#[ignore = "Requires running Postgres"]
async fn test_accept_quote_is_idempotent() {
    let pool = common::setup_test_db().await;
    let agent = common::agent("Priya");
    let lead_tracker = Arc::new(common::RecordingLeadTracker::new());
    let (_, service) = build_services(&pool, lead_tracker);

    let quote = service.create_quote(&agent, quote_request(dec!(40000))).await.unwrap();

    let first = service.accept_quote(quote.id).await.unwrap();
    let second = service.accept_quote(quote.id).await.unwrap();
    assert_eq!(first.id, second.id, "a quote never spawns two bookings");

    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM bookings WHERE quote_id = $1")
        .bind(quote.id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count.0, 1);
}

#[tokio::test]
#[ignore = "Requires running Postgres"]
async fn test_concurrent_acceptance_creates_one_booking() {
    let pool = common::setup_test_db().await;
    let agent = common::agent("Priya");
    let lead_tracker = Arc::new(common::RecordingLeadTracker::new());
    let catalog = Arc::new(common::FixtureCatalog::new());
    let booking_service = Arc::new(BookingService::new(pool.clone(), catalog));
    let service = Arc::new(QuoteService::new(
        pool.clone(),
        booking_service,
        lead_tracker,
        Arc::new(NullNotifier),
    ));

    let quote = service.create_quote(&agent, quote_request(dec!(40000))).await.unwrap();

    let first = {
        let service = service.clone();
        let quote_id = quote.id;
        tokio::spawn(async move { service.accept_quote(quote_id).await })
    };
    let second = {
        let service = service.clone();
        let quote_id = quote.id;
        tokio::spawn(async move { service.accept_quote(quote_id).await })
    };

    let first = first.await.unwrap().unwrap();
    let second = second.await.unwrap().unwrap();
    assert_eq!(first.id, second.id);

    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM bookings WHERE quote_id = $1")
        .bind(quote.id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count.0, 1);
}

#[tokio::test]
#[ignore = "Requires running Postgres"]
async fn test_acceptance_updates_linked_lead() {
    let pool = common::setup_test_db().await;
    let agent = common::agent("Priya");
    let lead_tracker = Arc::new(common::RecordingLeadTracker::new());
    let (_, service) = build_services(&pool, lead_tracker.clone());

    let lead_id = Uuid::new_v4();
    let mut request = quote_request(dec!(40000));
    request.lead_id = Some(lead_id);
    let quote = service.create_quote(&agent, request).await.unwrap();

    let booking = service.accept_quote(quote.id).await.unwrap();

    let recorded = lead_tracker.recorded();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].0, lead_id);
    assert_eq!(recorded[0].1.status, LeadStatus::Won);
    assert_eq!(recorded[0].1.booking_id, Some(booking.id));
}

#[tokio::test]
#[ignore = "Requires running Postgres"]
async fn test_lead_failure_does_not_roll_back_acceptance() {
    let pool = common::setup_test_db().await;
    let agent = common::agent("Priya");
    let (_, service) = build_services(&pool, Arc::new(common::FailingLeadTracker));

    let mut request = quote_request(dec!(40000));
    request.lead_id = Some(Uuid::new_v4());
    let quote = service.create_quote(&agent, request).await.unwrap();

    // The CRM is down; the booking still materializes and the quote still
    // closes as accepted.
    let booking = service.accept_quote(quote.id).await.unwrap();
    let stored = service.get_quote(quote.id).await.unwrap();
    assert_eq!(stored.status, QuoteStatus::Accepted);
    assert_eq!(stored.booking_id, Some(booking.id));
}

#[tokio::test]
#[ignore = "Requires running Postgres"]
async fn test_acceptance_without_any_price_fails_loudly() {
    let pool = common::setup_test_db().await;
    let agent = common::agent("Priya");
    let lead_tracker = Arc::new(common::RecordingLeadTracker::new());
    let (_, service) = build_services(&pool, lead_tracker);

    let mut request = quote_request(dec!(40000));
    request.budget = None;
    let quote = service.create_quote(&agent, request).await.unwrap();

    let result = service.accept_quote(quote.id).await;
    assert!(matches!(result, Err(AppError::Validation(_))));

    // The failure is on record and the quote is not left accepted.
    let stored = service.get_quote(quote.id).await.unwrap();
    assert_eq!(stored.status, QuoteStatus::Pending);
    assert!(stored.booking_id.is_none());
    let messages = service.discussion(quote.id).await.unwrap();
    assert!(messages
        .iter()
        .any(|m| m.kind == MessageKind::System && m.body.contains("booking creation failed")));
}

#[tokio::test]
#[ignore = "Requires running Postgres"]
async fn test_rejection_marks_lead_lost_without_booking() {
    let pool = common::setup_test_db().await;
    let agent = common::agent("Priya");
    let lead_tracker = Arc::new(common::RecordingLeadTracker::new());
    let (_, service) = build_services(&pool, lead_tracker.clone());

    let lead_id = Uuid::new_v4();
    let mut request = quote_request(dec!(40000));
    request.lead_id = Some(lead_id);
    let quote = service.create_quote(&agent, request).await.unwrap();

    let rejected = service
        .respond_to_quote(quote.id, &agent, "rejected", None)
        .await
        .unwrap();
    assert_eq!(rejected.status, QuoteStatus::Rejected);
    assert!(rejected.booking_id.is_none());

    let recorded = lead_tracker.recorded();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].1.status, LeadStatus::Lost);

    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM bookings WHERE quote_id = $1")
        .bind(quote.id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count.0, 0);
}

#[tokio::test]
#[ignore = "Requires running Postgres"]
async fn test_agent_cannot_respond_to_foreign_quote() {
    let pool = common::setup_test_db().await;
    let owner = common::agent("Priya");
    let stranger = common::agent("Rahul");
    let lead_tracker = Arc::new(common::RecordingLeadTracker::new());
    let (_, service) = build_services(&pool, lead_tracker);

    let quote = service.create_quote(&owner, quote_request(dec!(40000))).await.unwrap();

    let result = service
        .respond_to_quote(quote.id, &stranger, "accepted", None)
        .await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));
}

#[tokio::test]
#[ignore = "Requires running Postgres"]
async fn test_operations_response_keeps_quote_open_as_responded() {
    let pool = common::setup_test_db().await;
    let agent = common::agent("Priya");
    let ops = common::operations("Desk");
    let lead_tracker = Arc::new(common::RecordingLeadTracker::new());
    let (_, service) = build_services(&pool, lead_tracker);

    let quote = service.create_quote(&agent, quote_request(dec!(40000))).await.unwrap();

    let responded = service
        .respond_to_quote(quote.id, &ops, "priced at 45k, valid for a week", None)
        .await
        .unwrap();
    assert_eq!(responded.status, QuoteStatus::Responded);

    // Agent free text re-opens the quote for operations; the word
    // "accepted" inside a longer sentence is not a decision.
    let still_open = service
        .respond_to_quote(quote.id, &agent, "customer almost accepted, one more day", None)
        .await
        .unwrap();
    assert_eq!(still_open.status, QuoteStatus::Pending);

    let messages = service.discussion(quote.id).await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].kind, MessageKind::Operations);
    assert_eq!(messages[1].kind, MessageKind::Agent);
}

#[tokio::test]
#[ignore = "Requires running Postgres"]
async fn test_closed_quote_only_accepts_discussion_appends() {
    let pool = common::setup_test_db().await;
    let agent = common::agent("Priya");
    let lead_tracker = Arc::new(common::RecordingLeadTracker::new());
    let (_, service) = build_services(&pool, lead_tracker);

    let quote = service.create_quote(&agent, quote_request(dec!(40000))).await.unwrap();
    service.accept_quote(quote.id).await.unwrap();

    let after = service
        .respond_to_quote(quote.id, &agent, "rejected", None)
        .await
        .unwrap();
    assert_eq!(after.status, QuoteStatus::Accepted, "decided quotes stay decided");

    let messages = service.discussion(quote.id).await.unwrap();
    assert!(messages.iter().any(|m| m.body == "rejected"));
}
