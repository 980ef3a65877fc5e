use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How the client divided the cost. Splits always arrive as absolute amounts,
/// so the tag is kept for display only.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum SplitPolicy {
    #[default]
    Equal,
    Amount,
    Shares,
    Percentage,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Split {
    pub participant_id: String,
    pub amount: f64,
}

impl Split {
    pub fn new(participant_id: &str, amount: f64) -> Self {
        Split {
            participant_id: participant_id.to_string(),
            amount,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Expense {
    pub id: String,
    pub group_id: String,
    pub payer_id: String,
    pub cost: f64,
    pub description: String,
    pub split_policy: SplitPolicy,
    pub splits: Vec<Split>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub updated_at: DateTime<Utc>,
}

impl Expense {
    pub fn split_total(&self) -> f64 {
        self.splits.iter().map(|s| s.amount).sum()
    }
}
