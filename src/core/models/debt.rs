use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One `(lender, debtor, amount)` triple produced by the simplifier.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SettlementEdge {
    pub lender_id: String,
    pub debtor_id: String,
    pub amount: f64,
}

/// Persisted settlement edge.
///
/// Debts are derived data: every recompute deletes and regenerates them, so
/// `id` is only meaningful until the next ledger mutation. `paid_amount` stays
/// at zero under the ledger settlement model.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Debt {
    pub id: String,
    pub group_id: String,
    pub lender_id: String,
    pub debtor_id: String,
    pub amount: f64,
    pub paid_amount: f64,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
}

impl Debt {
    pub fn from_edge(group_id: &str, edge: SettlementEdge) -> Self {
        Debt {
            id: Uuid::new_v4().to_string(),
            group_id: group_id.to_string(),
            lender_id: edge.lender_id,
            debtor_id: edge.debtor_id,
            amount: edge.amount,
            paid_amount: 0.0,
            created_at: Utc::now(),
        }
    }

    pub fn outstanding(&self) -> f64 {
        self.amount - self.paid_amount
    }

    pub fn is_unpaid(&self, tolerance: f64) -> bool {
        self.outstanding() > tolerance
    }

    pub fn mentions(&self, participant_id: &str) -> bool {
        self.lender_id == participant_id || self.debtor_id == participant_id
    }
}
