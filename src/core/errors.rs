use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub title: String,
    pub description: String,
}

impl FieldError {
    pub fn new(field: &str, title: impl Into<String>, description: impl Into<String>) -> Self {
        FieldError {
            field: field.to_string(),
            title: title.into(),
            description: description.into(),
        }
    }
}

/// Coarse classification callers use to decide how to surface an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    NotFound,
    InvalidArgument,
    StorageFailure,
    ConsistencyViolation,
}

#[derive(Error, Debug, Serialize)]
pub enum SettleError {
    /// Group with given ID not found
    #[error("Group {0} not found")]
    GroupNotFound(String),

    /// Participant with given ID not found in the group
    #[error("Participant {0} not found")]
    ParticipantNotFound(String),

    #[error("Expense {0} not found")]
    ExpenseNotFound(String),

    /// Debt identifiers do not survive a recompute, so a stale ID lands here too
    #[error("Debt {0} not found")]
    DebtNotFound(String),

    /// Generic input validation error with detailed field information
    #[error("Invalid input for field `{0}`: {1:?}")]
    InvalidInput(String, FieldError),

    /// Split amounts don't add up to the expense cost
    #[error("Invalid split amounts: splits sum to {split_total}, cost is {cost}")]
    InvalidSplit { cost: f64, split_total: f64 },

    #[error("Invalid split participant: {0}")]
    InvalidSplitParticipant(String),

    #[error("Payment of {amount} exceeds outstanding debt {outstanding} on debt {debt_id}")]
    PaymentExceedsDebt {
        debt_id: String,
        amount: f64,
        outstanding: f64,
    },

    /// The requested operation belongs to the settlement model this engine does not run
    #[error("Operation `{operation}` is not available under the {active} settlement model")]
    SettlementModelMismatch {
        operation: String,
        active: String,
    },

    #[error("Ledger for group {group_id} does not balance: net drift {drift}")]
    ConsistencyViolation { group_id: String, drift: f64 },

    /// Ledger row points at a participant outside the group
    #[error("Ledger for group {group_id} references unknown participant {participant_id}")]
    UnknownParticipant {
        group_id: String,
        participant_id: String,
    },

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Logging error: {0}")]
    LoggingError(String),
}

impl SettleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SettleError::GroupNotFound(_)
            | SettleError::ParticipantNotFound(_)
            | SettleError::ExpenseNotFound(_)
            | SettleError::DebtNotFound(_) => ErrorKind::NotFound,
            SettleError::InvalidInput(..)
            | SettleError::InvalidSplit { .. }
            | SettleError::InvalidSplitParticipant(_)
            | SettleError::PaymentExceedsDebt { .. }
            | SettleError::SettlementModelMismatch { .. } => ErrorKind::InvalidArgument,
            SettleError::ConsistencyViolation { .. } | SettleError::UnknownParticipant { .. } => {
                ErrorKind::ConsistencyViolation
            }
            SettleError::StorageError(_) | SettleError::LoggingError(_) => ErrorKind::StorageFailure,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}
