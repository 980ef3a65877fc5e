pub mod config;
pub mod constants;
pub mod core;
pub mod infrastructure;

pub use crate::config::{CONFIG, EngineConfig, SettlementModel};
pub use crate::core::errors::{ErrorKind, SettleError};
pub use crate::core::events::LedgerEvent;
pub use crate::core::services::{ExpenseDraft, LedgerChange, PaidAmountUpdate, SettlementService};
pub use crate::infrastructure::logging::in_memory::InMemoryLogging;
pub use crate::infrastructure::storage::in_memory::InMemoryStorage;

#[cfg(test)]
mod tests;
