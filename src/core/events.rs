use serde::{Deserialize, Serialize};

/// Post-commit notification from the CRUD layer that the ledger of a group
/// changed. Handing one to the engine recomputes that group's debts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    ExpenseCreated { group_id: String },
    ExpenseUpdated { group_id: String },
    ExpenseDeleted { group_id: String },
    /// The engine purges every reference to the participant before recomputing.
    ParticipantDeleted { group_id: String, participant_id: String },
    /// Only valid under the ledger settlement model.
    PaymentRecorded { group_id: String },
}

impl LedgerEvent {
    pub fn group_id(&self) -> &str {
        match self {
            LedgerEvent::ExpenseCreated { group_id }
            | LedgerEvent::ExpenseUpdated { group_id }
            | LedgerEvent::ExpenseDeleted { group_id }
            | LedgerEvent::ParticipantDeleted { group_id, .. }
            | LedgerEvent::PaymentRecorded { group_id } => group_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LedgerEvent::ExpenseCreated { .. } => "expense_created",
            LedgerEvent::ExpenseUpdated { .. } => "expense_updated",
            LedgerEvent::ExpenseDeleted { .. } => "expense_deleted",
            LedgerEvent::ParticipantDeleted { .. } => "participant_deleted",
            LedgerEvent::PaymentRecorded { .. } => "payment_recorded",
        }
    }
}
