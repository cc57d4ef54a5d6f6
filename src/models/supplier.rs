use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A supplier attached to a booking.
///
/// The canonical representation is always the full assignment list; the
/// upstream single-supplier field survives only as the derived read-view
/// in [`primary_supplier`].
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SupplierAssignment {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub supplier_id: Uuid,
    pub assigned_by: Uuid,
    pub notes: Option<String>,
    pub assigned_at: DateTime<Utc>,
}

impl SupplierAssignment {
    pub fn new(booking_id: Uuid, supplier_id: Uuid, assigned_by: Uuid, notes: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            booking_id,
            supplier_id,
            assigned_by,
            notes,
            assigned_at: Utc::now(),
        }
    }
}

/// Legacy single-supplier view: the earliest assignment, if any.
pub fn primary_supplier(assignments: &[SupplierAssignment]) -> Option<Uuid> {
    assignments
        .iter()
        .min_by_key(|a| a.assigned_at)
        .map(|a| a.supplier_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_primary_supplier_is_earliest_assignment() {
        let booking_id = Uuid::new_v4();
        let ops = Uuid::new_v4();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        let mut a1 = SupplierAssignment::new(booking_id, first, ops, None);
        let mut a2 = SupplierAssignment::new(booking_id, second, ops, None);
        a1.assigned_at = Utc::now() - Duration::hours(2);
        a2.assigned_at = Utc::now();

        // Order in the slice must not matter.
        assert_eq!(primary_supplier(&[a2.clone(), a1.clone()]), Some(first));
        assert_eq!(primary_supplier(&[a1, a2]), Some(first));
    }

    #[test]
    fn test_primary_supplier_empty() {
        assert_eq!(primary_supplier(&[]), None);
    }
}
