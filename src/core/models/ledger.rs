use super::{Expense, Group, Participant, Payment};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Net signed balance per participant id. Positive means the participant is owed money.
pub type Balances = BTreeMap<String, f64>;

/// Consistent snapshot of everything that feeds a group's balances.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GroupLedger {
    pub group: Group,
    pub participants: Vec<Participant>,
    pub expenses: Vec<Expense>,
    pub payments: Vec<Payment>,
}

impl GroupLedger {
    pub fn has_participant(&self, participant_id: &str) -> bool {
        self.participants.iter().any(|p| p.id == participant_id)
    }
}
