use chrono::{DateTime, Datelike, Utc};
use uuid::Uuid;

/// Entities that carry a human-readable reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    /// `B<YY><MM>-<4 digits>`
    Booking,
    /// `Q<YY><MM>-<4 digits>`
    Quote,
    /// `INV<YY><MM><4 digits>` (no separator, matching issued invoices)
    Invoice,
    /// `WT<YY><MM>-<4 digits>`
    WalletTxn,
}

impl ReferenceKind {
    fn prefix(&self) -> &'static str {
        match self {
            ReferenceKind::Booking => "B",
            ReferenceKind::Quote => "Q",
            ReferenceKind::Invoice => "INV",
            ReferenceKind::WalletTxn => "WT",
        }
    }

    fn separator(&self) -> &'static str {
        match self {
            ReferenceKind::Invoice => "",
            _ => "-",
        }
    }
}

/// Generates date-prefixed human-readable references.
///
/// The 4-digit suffix is random, so collisions are possible within a month;
/// callers persist under a unique constraint and regenerate on violation,
/// bounded by a small retry count.
#[derive(Debug, Clone, Default)]
pub struct ReferenceGenerator;

/// Regeneration attempts before a collision is reported as an error.
pub const REFERENCE_RETRY_LIMIT: u32 = 5;

impl ReferenceGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn generate(&self, kind: ReferenceKind) -> String {
        self.generate_at(kind, Utc::now())
    }

    pub fn generate_at(&self, kind: ReferenceKind, at: DateTime<Utc>) -> String {
        let suffix = Self::random_suffix();
        format!(
            "{}{:02}{:02}{}{:04}",
            kind.prefix(),
            at.year() % 100,
            at.month(),
            kind.separator(),
            suffix
        )
    }

    fn random_suffix() -> u16 {
        let bytes = Uuid::new_v4().into_bytes();
        u16::from_be_bytes([bytes[0], bytes[1]]) % 10_000
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 6, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_booking_reference_format() {
        let generated = ReferenceGenerator::new().generate_at(ReferenceKind::Booking, at());
        assert_eq!(generated.len(), 10);
        assert!(generated.starts_with("B2608-"));
        assert!(generated[6..].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_quote_reference_format() {
        let generated = ReferenceGenerator::new().generate_at(ReferenceKind::Quote, at());
        assert!(generated.starts_with("Q2608-"));
    }

    #[test]
    fn test_invoice_reference_has_no_separator() {
        let generated = ReferenceGenerator::new().generate_at(ReferenceKind::Invoice, at());
        assert_eq!(generated.len(), 11);
        assert!(generated.starts_with("INV2608"));
        assert!(!generated.contains('-'));
    }

    #[test]
    fn test_wallet_txn_reference_format() {
        let generated = ReferenceGenerator::new().generate_at(ReferenceKind::WalletTxn, at());
        assert!(generated.starts_with("WT2608-"));
    }

    #[test]
    fn test_single_digit_month_is_zero_padded() {
        let january = Utc.with_ymd_and_hms(2027, 1, 15, 0, 0, 0).unwrap();
        let generated = ReferenceGenerator::new().generate_at(ReferenceKind::Booking, january);
        assert!(generated.starts_with("B2701-"));
    }

    #[test]
    fn test_suffix_stays_in_four_digits() {
        let generator = ReferenceGenerator::new();
        for _ in 0..256 {
            let generated = generator.generate_at(ReferenceKind::Booking, at());
            let suffix: u32 = generated[6..].parse().unwrap();
            assert!(suffix < 10_000);
        }
    }
}
