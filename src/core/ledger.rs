use crate::core::errors::SettleError;
use crate::core::models::GroupLedger;
use crate::infrastructure::storage::StorageTransaction;
use log::debug;

/// Loads the group's participants, expenses with splits, and payments.
///
/// Must be called on the same transaction that later writes the derived
/// debts, so the snapshot and the write agree.
pub async fn read_ledger<T>(tx: &mut T, group_id: &str) -> Result<GroupLedger, SettleError>
where
    T: StorageTransaction + ?Sized,
{
    let ledger = tx.load_group_ledger(group_id).await?;
    debug!(
        "Loaded ledger for group {}: {} participants, {} expenses, {} payments",
        group_id,
        ledger.participants.len(),
        ledger.expenses.len(),
        ledger.payments.len()
    );
    Ok(ledger)
}
