use crate::core::errors::SettleError;
use crate::core::models::{Debt, Expense, GroupLedger, Payment};
use async_trait::async_trait;
use serde::Serialize;

/// Store that owns groups, participants, the expense/payment ledger and the
/// derived debts.
#[async_trait]
pub trait Storage: Send + Sync {
    type Tx: StorageTransaction;

    /// Opens a write transaction. Work done through the returned handle is only
    /// visible to others once [`StorageTransaction::commit`] succeeds; dropping
    /// the handle without committing rolls everything back.
    async fn begin(&self) -> Result<Self::Tx, SettleError>;
}

#[async_trait]
pub trait StorageTransaction: Send {
    /// Fails with `GroupNotFound` when the group does not exist.
    async fn load_group_ledger(&mut self, group_id: &str) -> Result<GroupLedger, SettleError>;

    async fn list_debts(&mut self, group_id: &str) -> Result<Vec<Debt>, SettleError>;
    async fn get_debt(&mut self, debt_id: &str) -> Result<Option<Debt>, SettleError>;
    /// Deletes every debt of the group, then inserts `debts`.
    async fn replace_group_debts(&mut self, group_id: &str, debts: Vec<Debt>) -> Result<(), SettleError>;
    async fn update_debt(&mut self, debt: Debt) -> Result<(), SettleError>;

    async fn insert_payment(&mut self, payment: Payment) -> Result<(), SettleError>;

    async fn get_expense(&mut self, expense_id: &str) -> Result<Option<Expense>, SettleError>;
    async fn save_expense(&mut self, expense: Expense) -> Result<(), SettleError>;
    /// Returns false when no such expense existed.
    async fn delete_expense(&mut self, expense_id: &str) -> Result<bool, SettleError>;

    /// Removes a participant together with everything that references them.
    ///
    /// Expenses the participant paid are deleted. Their splits on other
    /// expenses are removed and the expense cost shrinks by the same amount, so
    /// every remaining expense still satisfies `sum(splits) == cost`; an expense
    /// left without splits is deleted. Payments and debts mentioning the
    /// participant are deleted. The participant row itself may already be gone;
    /// the references are purged either way.
    async fn delete_participant_cascade(
        &mut self,
        group_id: &str,
        participant_id: &str,
    ) -> Result<ParticipantRemoval, SettleError>;

    async fn commit(&mut self) -> Result<(), SettleError>;
}

/// What a participant cascade removed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ParticipantRemoval {
    pub participant_deleted: bool,
    pub expenses_deleted: usize,
    pub splits_removed: usize,
    pub payments_deleted: usize,
    pub debts_deleted: usize,
}

pub mod in_memory;
