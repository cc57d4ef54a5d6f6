use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use tracing::{error, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::collaborators::{LeadStatus, LeadTracker, LeadUpdate, Notifier, NotificationKind};
use crate::error::{AppError, Result};
use crate::idgen::{ReferenceGenerator, ReferenceKind, REFERENCE_RETRY_LIMIT};
use crate::models::{Actor, Booking, MessageKind, Quote, QuoteMessage, QuoteStatus, Role};
use crate::services::BookingService;

/// Request to open a new quote.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateQuoteRequest {
    #[validate(length(min = 1, message = "customer name is required"))]
    pub customer_name: String,
    #[validate(email(message = "customer email must be valid"))]
    pub customer_email: String,
    pub customer_phone: Option<String>,
    #[validate(length(min = 1, message = "destination is required"))]
    pub destination: String,
    pub travel_start: Option<NaiveDate>,
    pub travel_end: Option<NaiveDate>,
    #[validate(range(min = 1, message = "at least one adult traveler"))]
    pub adults: i32,
    #[validate(range(min = 0))]
    pub children: i32,
    pub budget: Option<Decimal>,
    pub lead_id: Option<Uuid>,
    pub itinerary: Option<String>,
}

/// Derives the status a quote should land in after a response.
///
/// Precedence: an explicit status in the request wins; an owning agent's
/// body of exactly `accepted`/`rejected` (case-insensitive) maps directly,
/// any other agent text keeps the quote open; operations and admin
/// responses mark it responded.
pub fn derive_response_status(
    responder: Role,
    body: &str,
    explicit: Option<QuoteStatus>,
) -> QuoteStatus {
    if let Some(status) = explicit {
        return status;
    }

    match responder {
        Role::Agent => {
            let normalized = body.trim().to_ascii_lowercase();
            match normalized.as_str() {
                "accepted" => QuoteStatus::Accepted,
                "rejected" => QuoteStatus::Rejected,
                _ => QuoteStatus::Pending,
            }
        }
        Role::Operations | Role::Admin => QuoteStatus::Responded,
    }
}

/// Owns quote lifecycle transitions and the accept-quote conversion into
/// a booking, including its exactly-once guarantee.
pub struct QuoteService {
    quote_repo: crate::repositories::QuoteRepository,
    booking_service: Arc<BookingService>,
    lead_tracker: Arc<dyn LeadTracker>,
    notifier: Arc<dyn Notifier>,
    refgen: ReferenceGenerator,
}

impl QuoteService {
    pub fn new(
        pool: PgPool,
        booking_service: Arc<BookingService>,
        lead_tracker: Arc<dyn LeadTracker>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            quote_repo: crate::repositories::QuoteRepository::new(pool),
            booking_service,
            lead_tracker,
            notifier,
            refgen: ReferenceGenerator::new(),
        }
    }

    pub async fn get_quote(&self, quote_id: Uuid) -> Result<Quote> {
        self.quote_repo
            .find_by_id(quote_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Quote '{}' not found", quote_id)))
    }

    pub async fn discussion(&self, quote_id: Uuid) -> Result<Vec<QuoteMessage>> {
        self.quote_repo.list_messages(quote_id).await
    }

    /// Opens a quote for the acting agent.
    pub async fn create_quote(&self, actor: &Actor, request: CreateQuoteRequest) -> Result<Quote> {
        if actor.role != Role::Agent {
            return Err(AppError::Forbidden("quotes are opened by agents".to_string()));
        }

        request
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let mut attempts = 0;
        loop {
            let now = Utc::now();
            let quote = Quote {
                id: Uuid::new_v4(),
                quote_ref: self.refgen.generate(ReferenceKind::Quote),
                agent_id: actor.id,
                customer_name: request.customer_name.clone(),
                customer_email: request.customer_email.clone(),
                customer_phone: request.customer_phone.clone(),
                destination: request.destination.clone(),
                travel_start: request.travel_start,
                travel_end: request.travel_end,
                adults: request.adults,
                children: request.children,
                status: QuoteStatus::Pending,
                quoted_price: None,
                budget: request.budget,
                currency: "INR".to_string(),
                itinerary: request.itinerary.clone(),
                booking_id: None,
                lead_id: request.lead_id,
                version: 1,
                created_at: now,
                updated_at: now,
            };

            match self.quote_repo.create(&quote).await {
                Ok(created) => {
                    info!(quote = %created.quote_ref, agent = %actor.id, "quote opened");
                    return Ok(created);
                }
                Err(err) if err.is_unique_violation() && attempts < REFERENCE_RETRY_LIMIT => {
                    attempts += 1;
                    warn!(attempts, "quote reference collision, regenerating");
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Prices an open quote. Operations-side mutation; the quoted price
    /// takes precedence over the customer budget when a booking is
    /// materialized.
    pub async fn price_quote(
        &self,
        quote_id: Uuid,
        actor: &Actor,
        amount: Decimal,
    ) -> Result<Quote> {
        if actor.role == Role::Agent {
            return Err(AppError::Forbidden(
                "agents may not price their own quotes".to_string(),
            ));
        }
        if amount <= Decimal::ZERO {
            return Err(AppError::Validation("quoted price must be positive".to_string()));
        }

        let quote = self.get_quote(quote_id).await?;
        if quote.status.is_closed() {
            return Err(AppError::Validation(format!(
                "quote {} is already decided",
                quote.quote_ref
            )));
        }

        let priced = self.quote_repo.set_quoted_price(quote.id, amount).await?;
        info!(quote = %priced.quote_ref, %amount, "quote priced");
        Ok(priced)
    }

    /// Appends a discussion entry and applies the derived status, kicking
    /// off the conversion flows when the outcome is a decision.
    pub async fn respond_to_quote(
        &self,
        quote_id: Uuid,
        actor: &Actor,
        body: &str,
        explicit_status: Option<QuoteStatus>,
    ) -> Result<Quote> {
        let quote = self.get_quote(quote_id).await?;

        if actor.role == Role::Agent && quote.agent_id != actor.id {
            return Err(AppError::Forbidden(format!(
                "agent {} does not own quote {}",
                actor.id, quote.quote_ref
            )));
        }

        if !body.trim().is_empty() {
            let message =
                QuoteMessage::new(quote.id, actor.id, MessageKind::from(actor.role), body);
            self.quote_repo.append_message(&message).await?;
        }

        // Closed quotes accept discussion appends only.
        if quote.status.is_closed() {
            return Ok(quote);
        }

        let target = derive_response_status(actor.role, body, explicit_status);

        let updated = match target {
            QuoteStatus::Accepted => {
                let booking = self.accept_quote(quote.id).await?;
                self.notify_agent(
                    &quote,
                    "Quote accepted",
                    &format!("Booking {} created from quote {}", booking.booking_ref, quote.quote_ref),
                    NotificationKind::QuoteAccepted,
                )
                .await;
                return self.get_quote(quote.id).await;
            }
            QuoteStatus::Rejected => {
                let rejected = self.reject_quote(quote.id).await?;
                self.notify_agent(
                    &quote,
                    "Quote rejected",
                    &format!("Quote {} was rejected", quote.quote_ref),
                    NotificationKind::QuoteRejected,
                )
                .await;
                return Ok(rejected);
            }
            same if same == quote.status => quote,
            other => self
                .quote_repo
                .update_status(quote.id, quote.status, other)
                .await?
                .ok_or_else(|| {
                    AppError::ConcurrentModification(format!("quote {}", quote.quote_ref))
                })?,
        };

        if actor.role != Role::Agent {
            self.notify_agent(
                &updated,
                "Quote response",
                &format!("Operations responded on quote {}", updated.quote_ref),
                NotificationKind::QuoteResponse,
            )
            .await;
        }

        Ok(updated)
    }

    /// Accepts a quote, materializing its booking exactly once.
    ///
    /// Re-acceptance returns the already-materialized booking (advancing it
    /// to CONFIRMED if it lingered earlier); a failed materialization is
    /// recorded in the discussion and propagated so the quote is never left
    /// accepted without a booking.
    pub async fn accept_quote(&self, quote_id: Uuid) -> Result<Booking> {
        let quote = self.get_quote(quote_id).await?;

        if quote.status == QuoteStatus::Rejected {
            return Err(AppError::Validation(format!(
                "quote {} was already rejected",
                quote.quote_ref
            )));
        }

        let booking = match self
            .booking_service
            .find_for_quote(&quote)
            .await?
        {
            Some(existing) => {
                let advanced = self.booking_service.advance_to_confirmed(&existing).await?;
                info!(
                    quote = %quote.quote_ref,
                    booking = %advanced.booking_ref,
                    "quote already materialized, reusing booking"
                );
                advanced
            }
            None => match self.booking_service.materialize_from_quote(&quote).await {
                Ok(created) => created,
                Err(err) => {
                    let note = QuoteMessage::system(
                        quote.id,
                        format!("booking creation failed: {}", err),
                    );
                    if let Err(log_err) = self.quote_repo.append_message(&note).await {
                        error!(quote = %quote.quote_ref, %log_err, "failed to record materialization failure");
                    }
                    return Err(err);
                }
            },
        };

        self.quote_repo.mark_accepted(quote.id, booking.id).await?;

        if let Some(lead_id) = quote.lead_id {
            let update = LeadUpdate {
                status: LeadStatus::Won,
                booking_id: Some(booking.id),
                quote_id: Some(quote.id),
            };
            if let Err(err) = self.lead_tracker.update_lead(lead_id, update).await {
                warn!(quote = %quote.quote_ref, %lead_id, %err, "lead update failed, continuing");
            }
        }

        let note = QuoteMessage::system(
            quote.id,
            format!("quote accepted, booking {} linked", booking.booking_ref),
        );
        if let Err(err) = self.quote_repo.append_message(&note).await {
            warn!(quote = %quote.quote_ref, %err, "failed to append acceptance note");
        }

        info!(quote = %quote.quote_ref, booking = %booking.booking_ref, "quote accepted");
        Ok(booking)
    }

    /// Rejects a quote. No booking side effect.
    pub async fn reject_quote(&self, quote_id: Uuid) -> Result<Quote> {
        let quote = self.get_quote(quote_id).await?;

        if quote.status == QuoteStatus::Rejected {
            return Ok(quote);
        }
        if quote.status == QuoteStatus::Accepted {
            return Err(AppError::Validation(format!(
                "quote {} was already accepted",
                quote.quote_ref
            )));
        }

        let rejected = self
            .quote_repo
            .update_status(quote.id, quote.status, QuoteStatus::Rejected)
            .await?
            .ok_or_else(|| AppError::ConcurrentModification(format!("quote {}", quote.quote_ref)))?;

        if let Some(lead_id) = quote.lead_id {
            let update = LeadUpdate {
                status: LeadStatus::Lost,
                booking_id: None,
                quote_id: Some(quote.id),
            };
            if let Err(err) = self.lead_tracker.update_lead(lead_id, update).await {
                warn!(quote = %quote.quote_ref, %lead_id, %err, "lead update failed, continuing");
            }
        }

        let note = QuoteMessage::system(quote.id, "quote rejected".to_string());
        if let Err(err) = self.quote_repo.append_message(&note).await {
            warn!(quote = %quote.quote_ref, %err, "failed to append rejection note");
        }

        info!(quote = %rejected.quote_ref, "quote rejected");
        Ok(rejected)
    }

    async fn notify_agent(
        &self,
        quote: &Quote,
        title: &str,
        message: &str,
        kind: NotificationKind,
    ) {
        if let Err(err) = self
            .notifier
            .notify(quote.agent_id, title, message, kind, &quote.quote_ref)
            .await
        {
            warn!(quote = %quote.quote_ref, %err, "notification failed, continuing");
        }
    }
}
