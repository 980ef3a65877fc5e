use crate::core::errors::SettleError;
use crate::core::models::{Debt, Expense, Group, GroupLedger, Participant, Payment};
use crate::infrastructure::storage::{ParticipantRemoval, Storage, StorageTransaction};
use async_trait::async_trait;
use log::debug;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Clone, Debug, Default)]
struct StoreState {
    groups: BTreeMap<String, Group>,
    participants: BTreeMap<String, Participant>,
    expenses: BTreeMap<String, Expense>,
    payments: Vec<Payment>,
    debts: BTreeMap<String, Debt>,
}

/// Transactional store kept in process memory.
///
/// Transactions are fully serialized: `begin` takes the single state lock and
/// hands out a private copy that replaces the shared state on commit.
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    state: Arc<Mutex<StoreState>>,
    fail_debt_writes: Arc<AtomicBool>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_group(&self, group: Group) -> Group {
        let mut state = self.state.lock().await;
        state.groups.insert(group.id.clone(), group.clone());
        group
    }

    pub async fn add_participant(&self, participant: Participant) -> Result<Participant, SettleError> {
        let mut state = self.state.lock().await;
        if !state.groups.contains_key(&participant.group_id) {
            return Err(SettleError::GroupNotFound(participant.group_id));
        }
        state
            .participants
            .insert(participant.id.clone(), participant.clone());
        Ok(participant)
    }

    /// Makes every subsequent `replace_group_debts` fail until reset. Used to
    /// exercise rollback paths.
    pub fn set_fail_debt_writes(&self, fail: bool) {
        self.fail_debt_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    type Tx = InMemoryTransaction;

    async fn begin(&self) -> Result<InMemoryTransaction, SettleError> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(InMemoryTransaction {
            guard,
            working,
            committed: false,
            fail_debt_writes: self.fail_debt_writes.clone(),
        })
    }
}

pub struct InMemoryTransaction {
    guard: OwnedMutexGuard<StoreState>,
    working: StoreState,
    committed: bool,
    fail_debt_writes: Arc<AtomicBool>,
}

impl InMemoryTransaction {
    fn ensure_open(&self) -> Result<(), SettleError> {
        if self.committed {
            return Err(SettleError::StorageError(
                "transaction already committed".to_string(),
            ));
        }
        Ok(())
    }

    fn ensure_group(&self, group_id: &str) -> Result<(), SettleError> {
        if !self.working.groups.contains_key(group_id) {
            return Err(SettleError::GroupNotFound(group_id.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageTransaction for InMemoryTransaction {
    async fn load_group_ledger(&mut self, group_id: &str) -> Result<GroupLedger, SettleError> {
        self.ensure_open()?;
        let group = self
            .working
            .groups
            .get(group_id)
            .cloned()
            .ok_or_else(|| SettleError::GroupNotFound(group_id.to_string()))?;

        Ok(GroupLedger {
            group,
            participants: self
                .working
                .participants
                .values()
                .filter(|p| p.group_id == group_id)
                .cloned()
                .collect(),
            expenses: self
                .working
                .expenses
                .values()
                .filter(|e| e.group_id == group_id)
                .cloned()
                .collect(),
            payments: self
                .working
                .payments
                .iter()
                .filter(|p| p.group_id == group_id)
                .cloned()
                .collect(),
        })
    }

    async fn list_debts(&mut self, group_id: &str) -> Result<Vec<Debt>, SettleError> {
        self.ensure_open()?;
        self.ensure_group(group_id)?;
        Ok(self
            .working
            .debts
            .values()
            .filter(|d| d.group_id == group_id)
            .cloned()
            .collect())
    }

    async fn get_debt(&mut self, debt_id: &str) -> Result<Option<Debt>, SettleError> {
        self.ensure_open()?;
        Ok(self.working.debts.get(debt_id).cloned())
    }

    async fn replace_group_debts(&mut self, group_id: &str, debts: Vec<Debt>) -> Result<(), SettleError> {
        self.ensure_open()?;
        self.ensure_group(group_id)?;
        if self.fail_debt_writes.load(Ordering::SeqCst) {
            return Err(SettleError::StorageError(format!(
                "write to debts of group {} rejected",
                group_id
            )));
        }

        self.working.debts.retain(|_, d| d.group_id != group_id);
        for debt in debts {
            self.working.debts.insert(debt.id.clone(), debt);
        }
        Ok(())
    }

    async fn update_debt(&mut self, debt: Debt) -> Result<(), SettleError> {
        self.ensure_open()?;
        match self.working.debts.get_mut(&debt.id) {
            Some(existing) => {
                *existing = debt;
                Ok(())
            }
            None => Err(SettleError::DebtNotFound(debt.id)),
        }
    }

    async fn insert_payment(&mut self, payment: Payment) -> Result<(), SettleError> {
        self.ensure_open()?;
        self.ensure_group(&payment.group_id)?;
        self.working.payments.push(payment);
        Ok(())
    }

    async fn get_expense(&mut self, expense_id: &str) -> Result<Option<Expense>, SettleError> {
        self.ensure_open()?;
        Ok(self.working.expenses.get(expense_id).cloned())
    }

    async fn save_expense(&mut self, expense: Expense) -> Result<(), SettleError> {
        self.ensure_open()?;
        self.ensure_group(&expense.group_id)?;
        self.working.expenses.insert(expense.id.clone(), expense);
        Ok(())
    }

    async fn delete_expense(&mut self, expense_id: &str) -> Result<bool, SettleError> {
        self.ensure_open()?;
        Ok(self.working.expenses.remove(expense_id).is_some())
    }

    async fn delete_participant_cascade(
        &mut self,
        group_id: &str,
        participant_id: &str,
    ) -> Result<ParticipantRemoval, SettleError> {
        self.ensure_open()?;
        self.ensure_group(group_id)?;
        let mut removal = ParticipantRemoval::default();
        if let Some(p) = self.working.participants.get(participant_id) {
            if p.group_id != group_id {
                return Err(SettleError::ParticipantNotFound(participant_id.to_string()));
            }
            self.working.participants.remove(participant_id);
            removal.participant_deleted = true;
        }

        let before = self.working.expenses.len();
        self.working
            .expenses
            .retain(|_, e| !(e.group_id == group_id && e.payer_id == participant_id));
        removal.expenses_deleted = before - self.working.expenses.len();

        for expense in self
            .working
            .expenses
            .values_mut()
            .filter(|e| e.group_id == group_id)
        {
            let removed: f64 = expense
                .splits
                .iter()
                .filter(|s| s.participant_id == participant_id)
                .map(|s| s.amount)
                .sum();
            let split_count = expense.splits.len();
            expense.splits.retain(|s| s.participant_id != participant_id);
            let dropped = split_count - expense.splits.len();
            if dropped > 0 {
                removal.splits_removed += dropped;
                expense.cost -= removed;
                expense.updated_at = chrono::Utc::now();
            }
        }
        let before = self.working.expenses.len();
        self.working
            .expenses
            .retain(|_, e| !(e.group_id == group_id && e.splits.is_empty()));
        removal.expenses_deleted += before - self.working.expenses.len();

        let before = self.working.payments.len();
        self.working.payments.retain(|p| {
            !(p.group_id == group_id && (p.payer_id == participant_id || p.payee_id == participant_id))
        });
        removal.payments_deleted = before - self.working.payments.len();

        let before = self.working.debts.len();
        self.working
            .debts
            .retain(|_, d| !(d.group_id == group_id && d.mentions(participant_id)));
        removal.debts_deleted = before - self.working.debts.len();

        debug!(
            "Cascade for participant {} in group {}: {:?}",
            participant_id, group_id, removal
        );
        Ok(removal)
    }

    async fn commit(&mut self) -> Result<(), SettleError> {
        self.ensure_open()?;
        *self.guard = std::mem::take(&mut self.working);
        self.committed = true;
        Ok(())
    }
}
