// Action names written to the action log.
pub const DEBTS_RECOMPUTED: &str = "DEBTS_RECOMPUTED";
pub const EXPENSE_ADDED: &str = "EXPENSE_ADDED";
pub const EXPENSE_UPDATED: &str = "EXPENSE_UPDATED";
pub const EXPENSE_DELETED: &str = "EXPENSE_DELETED";
pub const PARTICIPANT_DELETED: &str = "PARTICIPANT_DELETED";
pub const PAYMENT_CREATED: &str = "PAYMENT_CREATED";
pub const DEBT_PAID_AMOUNT_UPDATED: &str = "DEBT_PAID_AMOUNT_UPDATED";
pub const LEDGER_EVENT_HANDLED: &str = "LEDGER_EVENT_HANDLED";

/// Balances and settlement amounts at or below this magnitude count as settled.
pub const DUST_TOLERANCE: f64 = 0.01;

/// Allowed gap between an expense cost and the sum of its splits.
pub const SPLIT_TOLERANCE: f64 = 0.01;

pub const MAX_AMOUNT: f64 = 1_000_000.0;

pub const MAX_DESCRIPTION_LENGTH: usize = 255;
