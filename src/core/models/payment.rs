use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Transfer of `amount` from `payer_id` to `payee_id`. Never edited once written.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Payment {
    pub id: String,
    pub group_id: String,
    pub payer_id: String,
    pub payee_id: String,
    pub amount: f64,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
}

impl Payment {
    pub fn new(group_id: &str, payer_id: &str, payee_id: &str, amount: f64) -> Self {
        Payment {
            id: Uuid::new_v4().to_string(),
            group_id: group_id.to_string(),
            payer_id: payer_id.to_string(),
            payee_id: payee_id.to_string(),
            amount,
            created_at: Utc::now(),
        }
    }
}
