pub mod audit;
pub mod debt;
pub mod expense;
pub mod group;
pub mod ledger;
pub mod payment;

pub use audit::AppLog;
pub use debt::{Debt, SettlementEdge};
pub use expense::{Expense, Split, SplitPolicy};
pub use group::{Group, Participant};
pub use ledger::{Balances, GroupLedger};
pub use payment::Payment;
