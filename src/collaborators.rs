use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::models::TourPackage;

/// CRM-side status a lead lands in after a quote decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeadStatus {
    Won,
    Lost,
}

/// Update pushed to the CRM when a quote is decided.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadUpdate {
    pub status: LeadStatus,
    pub booking_id: Option<Uuid>,
    pub quote_id: Option<Uuid>,
}

/// Classification of an outbound notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    QuoteResponse,
    QuoteAccepted,
    QuoteRejected,
    BookingUpdate,
}

/// Read-only package catalog lookup. Internals are out of scope; the core
/// consults it only at booking time.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PackageCatalog: Send + Sync {
    async fn get_package(&self, id: Uuid) -> Result<Option<TourPackage>>;
}

/// Lead/CRM collaborator. Calls are fire-and-forget: failures are logged by
/// the caller and never roll back the primary operation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LeadTracker: Send + Sync {
    async fn update_lead(&self, lead_id: Uuid, update: LeadUpdate) -> Result<()>;
}

/// Notification delivery collaborator. Failures are non-fatal.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        target: Uuid,
        title: &str,
        message: &str,
        kind: NotificationKind,
        related_ref: &str,
    ) -> Result<()>;
}

/// Default lead tracker for deployments without a CRM integration.
#[derive(Debug, Default)]
pub struct NullLeadTracker;

#[async_trait]
impl LeadTracker for NullLeadTracker {
    async fn update_lead(&self, _lead_id: Uuid, _update: LeadUpdate) -> Result<()> {
        Ok(())
    }
}

/// Default notifier that drops messages.
#[derive(Debug, Default)]
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn notify(
        &self,
        _target: Uuid,
        _title: &str,
        _message: &str,
        _kind: NotificationKind,
        _related_ref: &str,
    ) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_null_collaborators_accept_everything() {
        let lead_tracker = NullLeadTracker;
        let update = LeadUpdate {
            status: LeadStatus::Won,
            booking_id: Some(Uuid::new_v4()),
            quote_id: None,
        };
        assert!(lead_tracker.update_lead(Uuid::new_v4(), update).await.is_ok());

        let notifier = NullNotifier;
        assert!(notifier
            .notify(
                Uuid::new_v4(),
                "Quote accepted",
                "Booking created",
                NotificationKind::QuoteAccepted,
                "Q2608-0042",
            )
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_mock_catalog_returns_package() {
        use rust_decimal_macros::dec;

        let mut catalog = MockPackageCatalog::new();
        let package_id = Uuid::new_v4();
        catalog.expect_get_package().returning(move |id| {
            Ok(Some(TourPackage {
                id,
                name: "Andaman Explorer".to_string(),
                price: dec!(64000),
                agent_price: dec!(58000),
                is_active: true,
                duration_days: 7,
            }))
        });

        let found = catalog.get_package(package_id).await.unwrap();
        assert!(found.unwrap().bookable());
    }
}
