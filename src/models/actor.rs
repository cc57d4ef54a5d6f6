use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Closed set of roles that may invoke core operations.
///
/// Replaces the ad-hoc role-string comparisons of the upstream system with
/// a capability table evaluated once per operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Travel agent: opens quotes, funds self-service bookings, owns a wallet.
    Agent,
    /// Operations staff: responds to quotes, drives booking statuses, claims payments.
    Operations,
    /// Administrator: operations capabilities plus terminal-lock override.
    Admin,
}

impl Role {
    /// May move a booking through its status state machine.
    pub fn can_transition_booking(&self) -> bool {
        matches!(self, Role::Operations | Role::Admin)
    }

    /// May record payment claims against a booking.
    pub fn can_claim_payment(&self) -> bool {
        matches!(self, Role::Operations | Role::Admin)
    }

    /// May attach suppliers to a booking.
    pub fn can_assign_suppliers(&self) -> bool {
        matches!(self, Role::Operations | Role::Admin)
    }

    /// May cancel bookings it does not own.
    pub fn can_cancel_any_booking(&self) -> bool {
        matches!(self, Role::Operations | Role::Admin)
    }

    /// May move a BOOKED booking somewhere other than COMPLETED.
    pub fn can_override_terminal_lock(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

/// The authenticated caller of a core operation.
///
/// Supplied by the (out-of-scope) auth middleware; the core trusts the role
/// and identity it is given and enforces ownership per operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub name: String,
    pub role: Role,
}

impl Actor {
    pub fn new(id: Uuid, name: impl Into<String>, role: Role) -> Self {
        Self {
            id,
            name: name.into(),
            role,
        }
    }

    /// True when this actor is the agent that owns the given record.
    pub fn owns(&self, agent_id: Uuid) -> bool {
        self.role == Role::Agent && self.id == agent_id
    }
}
