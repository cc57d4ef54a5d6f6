use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Read-only view of a catalog package, as returned by the external
/// package catalog. The catalog itself is out of scope; the core only
/// needs pricing and the active flag at booking time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TourPackage {
    pub id: Uuid,
    pub name: String,
    pub price: Decimal,
    /// Net price charged to the agent's wallet.
    pub agent_price: Decimal,
    pub is_active: bool,
    pub duration_days: i32,
}

impl TourPackage {
    pub fn bookable(&self) -> bool {
        self.is_active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_bookable_follows_active_flag() {
        let mut pkg = TourPackage {
            id: Uuid::new_v4(),
            name: "Kerala Backwaters 5N".to_string(),
            price: dec!(52000),
            agent_price: dec!(47500),
            is_active: true,
            duration_days: 6,
        };
        assert!(pkg.bookable());
        pkg.is_active = false;
        assert!(!pkg.bookable());
    }
}
