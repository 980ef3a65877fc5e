use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Group {
    pub id: String,
    pub name: String,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Group {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
        }
    }
}

/// Member of exactly one group. Group membership never changes.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Participant {
    pub id: String,
    pub group_id: String,
    pub name: String,
}

impl Participant {
    pub fn new(group_id: &str, name: impl Into<String>) -> Self {
        Participant {
            id: Uuid::new_v4().to_string(),
            group_id: group_id.to_string(),
            name: name.into(),
        }
    }
}
