use crate::config::{CONFIG, EngineConfig, SettlementModel};
use crate::constants::{
    DEBT_PAID_AMOUNT_UPDATED, DEBTS_RECOMPUTED, EXPENSE_ADDED, EXPENSE_DELETED, EXPENSE_UPDATED,
    LEDGER_EVENT_HANDLED, MAX_DESCRIPTION_LENGTH, PARTICIPANT_DELETED, PAYMENT_CREATED, SPLIT_TOLERANCE,
};
use crate::core::balance::{aggregate_balances, check_zero_sum};
use crate::core::errors::{FieldError, SettleError};
use crate::core::events::LedgerEvent;
use crate::core::ledger::read_ledger;
use crate::core::locks::GroupLocks;
use crate::core::models::{AppLog, Balances, Debt, Expense, GroupLedger, Payment, Split, SplitPolicy};
use crate::core::simplify::{settle_with, simplify_debts};
use crate::infrastructure::logging::LoggingService;
use crate::infrastructure::storage::{ParticipantRemoval, Storage, StorageTransaction};
use chrono::Utc;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Expense fields supplied by the caller on create and update.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExpenseDraft {
    pub payer_id: String,
    pub cost: f64,
    pub description: String,
    pub split_policy: SplitPolicy,
    pub splits: Vec<Split>,
}

/// Result of a mutation together with the group's debts after the recompute.
#[derive(Clone, Debug, Serialize)]
pub struct LedgerChange<T> {
    pub value: T,
    pub debts: Vec<Debt>,
}

#[derive(Clone, Debug, Serialize)]
pub struct PaidAmountUpdate {
    pub debt: Debt,
    /// Only present when the paid amount went up.
    pub payment: Option<Payment>,
}

pub struct SettlementService<L: LoggingService, S: Storage> {
    storage: S,
    logging: L,
    config: EngineConfig,
    locks: GroupLocks,
}

impl<L: LoggingService, S: Storage> SettlementService<L, S> {
    pub fn new(storage: S, logging: L) -> Self {
        Self::with_config(storage, logging, (*CONFIG).clone())
    }

    pub fn with_config(storage: S, logging: L, config: EngineConfig) -> Self {
        info!(
            "Initializing SettlementService with {} settlement model",
            config.settlement_model
        );
        SettlementService {
            storage,
            logging,
            config,
            locks: GroupLocks::new(),
        }
    }

    pub fn settlement_model(&self) -> SettlementModel {
        self.config.settlement_model
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    // RECOMPUTE

    /// Rebuilds the persisted debts of a group from its ledger in one transaction.
    pub async fn recompute(&self, group_id: &str) -> Result<Vec<Debt>, SettleError> {
        let _guard = self.locks.acquire(group_id).await;
        let mut tx = self.storage.begin().await?;
        let debts = self.recompute_in(&mut tx, group_id).await?;

        self.log_and_audit(
            group_id,
            DEBTS_RECOMPUTED,
            json!({ "group_id": group_id, "debt_count": debts.len() }),
        )
        .await?;
        tx.commit().await?;
        Ok(debts)
    }

    /// Entry point for the CRUD layer after it committed a ledger change.
    pub async fn handle_event(&self, event: LedgerEvent) -> Result<Vec<Debt>, SettleError> {
        info!(
            "Handling {} event for group {}",
            event.name(),
            event.group_id()
        );
        if let LedgerEvent::PaymentRecorded { .. } = event {
            self.require_model(SettlementModel::Ledger, event.name())?;
        }

        let group_id = event.group_id();
        let _guard = self.locks.acquire(group_id).await;
        let mut tx = self.storage.begin().await?;

        let mut details = json!({ "event": event.name(), "group_id": group_id });
        if let LedgerEvent::ParticipantDeleted { participant_id, .. } = &event {
            let removal = tx.delete_participant_cascade(group_id, participant_id).await?;
            details["participant_id"] = json!(participant_id);
            details["removal"] = json!(removal);
        }

        let debts = self.recompute_in(&mut tx, group_id).await?;
        details["debt_count"] = json!(debts.len());
        self.log_and_audit(group_id, LEDGER_EVENT_HANDLED, details).await?;
        tx.commit().await?;
        Ok(debts)
    }

    /// The one place balances are aggregated and simplified. Callers hold the
    /// group lock and commit `tx` themselves.
    #[tracing::instrument(level = "debug", skip(self, tx), fields(model = %self.config.settlement_model))]
    async fn recompute_in(&self, tx: &mut S::Tx, group_id: &str) -> Result<Vec<Debt>, SettleError> {
        let tolerance = self.config.dust_tolerance;
        let ledger = read_ledger(tx, group_id).await?;
        let balances = self.balances_of(&ledger)?;

        let edges = simplify_debts(&balances, tolerance);
        let residual = settle_with(&balances, &edges);
        if let Some((participant_id, left)) = residual.iter().find(|(_, b)| b.abs() > tolerance) {
            warn!(
                "Participant {} in group {} keeps {} after settlement",
                participant_id, group_id, left
            );
        }

        // Paid amounts live on the debt rows in this model, so keep them
        // across regeneration for the same lender/debtor pair.
        let carried: HashMap<(String, String), f64> = match self.config.settlement_model {
            SettlementModel::Ledger => HashMap::new(),
            SettlementModel::PaidAmount => tx
                .list_debts(group_id)
                .await?
                .into_iter()
                .map(|d| ((d.lender_id, d.debtor_id), d.paid_amount))
                .collect(),
        };

        let debts: Vec<Debt> = edges
            .into_iter()
            .map(|edge| {
                let paid = carried
                    .get(&(edge.lender_id.clone(), edge.debtor_id.clone()))
                    .copied()
                    .unwrap_or(0.0);
                let mut debt = Debt::from_edge(group_id, edge);
                debt.paid_amount = paid.min(debt.amount);
                debt
            })
            .collect();

        tx.replace_group_debts(group_id, debts.clone()).await?;
        debug!("Replaced debts for group {} with {} rows", group_id, debts.len());
        Ok(debts)
    }

    fn balances_of(&self, ledger: &GroupLedger) -> Result<Balances, SettleError> {
        let include_payments = self.config.settlement_model == SettlementModel::Ledger;
        let balances = aggregate_balances(ledger, include_payments)?;
        // Each expense may carry up to SPLIT_TOLERANCE of split rounding.
        let tolerance = self.config.dust_tolerance + SPLIT_TOLERANCE * ledger.expenses.len() as f64;
        check_zero_sum(&ledger.group.id, &balances, tolerance)?;
        Ok(balances)
    }

    // LEDGER MUTATIONS

    pub async fn add_expense(
        &self,
        group_id: &str,
        draft: ExpenseDraft,
    ) -> Result<LedgerChange<Expense>, SettleError> {
        info!(
            "Adding expense of {} paid by {} in group {}",
            draft.cost, draft.payer_id, group_id
        );
        self.validate_draft(&draft)?;

        let _guard = self.locks.acquire(group_id).await;
        let mut tx = self.storage.begin().await?;
        let ledger = read_ledger(&mut tx, group_id).await?;
        self.validate_draft_members(&ledger, &draft)?;

        let now = Utc::now();
        let expense = Expense {
            id: Uuid::new_v4().to_string(),
            group_id: group_id.to_string(),
            payer_id: draft.payer_id,
            cost: draft.cost,
            description: draft.description,
            split_policy: draft.split_policy,
            splits: draft.splits,
            created_at: now,
            updated_at: now,
        };
        tx.save_expense(expense.clone()).await?;
        let debts = self.recompute_in(&mut tx, group_id).await?;

        self.log_and_audit(
            group_id,
            EXPENSE_ADDED,
            json!({
                "expense_id": expense.id,
                "group_id": group_id,
                "cost": expense.cost,
                "payer_id": expense.payer_id,
                "debt_count": debts.len()
            }),
        )
        .await?;
        tx.commit().await?;
        debug!("Expense created with ID: {}", expense.id);

        Ok(LedgerChange {
            value: expense,
            debts,
        })
    }

    pub async fn update_expense(
        &self,
        expense_id: &str,
        draft: ExpenseDraft,
    ) -> Result<LedgerChange<Expense>, SettleError> {
        info!("Updating expense {}", expense_id);
        self.validate_draft(&draft)?;
        let group_id = self.locate_expense(expense_id).await?;

        let _guard = self.locks.acquire(&group_id).await;
        let mut tx = self.storage.begin().await?;
        let existing = tx
            .get_expense(expense_id)
            .await?
            .filter(|e| e.group_id == group_id)
            .ok_or_else(|| SettleError::ExpenseNotFound(expense_id.to_string()))?;
        let ledger = read_ledger(&mut tx, &group_id).await?;
        self.validate_draft_members(&ledger, &draft)?;

        let updated = Expense {
            payer_id: draft.payer_id,
            cost: draft.cost,
            description: draft.description,
            split_policy: draft.split_policy,
            splits: draft.splits,
            updated_at: Utc::now(),
            ..existing
        };
        tx.save_expense(updated.clone()).await?;
        let debts = self.recompute_in(&mut tx, &group_id).await?;

        self.log_and_audit(
            &group_id,
            EXPENSE_UPDATED,
            json!({
                "expense_id": updated.id,
                "group_id": group_id,
                "new_cost": updated.cost,
                "debt_count": debts.len()
            }),
        )
        .await?;
        tx.commit().await?;

        Ok(LedgerChange {
            value: updated,
            debts,
        })
    }

    pub async fn delete_expense(&self, expense_id: &str) -> Result<LedgerChange<Expense>, SettleError> {
        info!("Deleting expense {}", expense_id);
        let group_id = self.locate_expense(expense_id).await?;

        let _guard = self.locks.acquire(&group_id).await;
        let mut tx = self.storage.begin().await?;
        let existing = tx
            .get_expense(expense_id)
            .await?
            .filter(|e| e.group_id == group_id)
            .ok_or_else(|| SettleError::ExpenseNotFound(expense_id.to_string()))?;
        tx.delete_expense(expense_id).await?;
        let debts = self.recompute_in(&mut tx, &group_id).await?;

        self.log_and_audit(
            &group_id,
            EXPENSE_DELETED,
            json!({ "expense_id": expense_id, "group_id": group_id, "debt_count": debts.len() }),
        )
        .await?;
        tx.commit().await?;

        Ok(LedgerChange {
            value: existing,
            debts,
        })
    }

    /// Deletes a participant, purges everything referencing them, then recomputes.
    pub async fn delete_participant(
        &self,
        group_id: &str,
        participant_id: &str,
    ) -> Result<LedgerChange<ParticipantRemoval>, SettleError> {
        info!("Deleting participant {} from group {}", participant_id, group_id);
        let _guard = self.locks.acquire(group_id).await;
        let mut tx = self.storage.begin().await?;
        let ledger = read_ledger(&mut tx, group_id).await?;
        if !ledger.has_participant(participant_id) {
            warn!("Participant {} not in group {}", participant_id, group_id);
            return Err(SettleError::ParticipantNotFound(participant_id.to_string()));
        }

        let removal = tx.delete_participant_cascade(group_id, participant_id).await?;
        let debts = self.recompute_in(&mut tx, group_id).await?;

        self.log_and_audit(
            group_id,
            PARTICIPANT_DELETED,
            json!({
                "group_id": group_id,
                "participant_id": participant_id,
                "removal": removal,
                "debt_count": debts.len()
            }),
        )
        .await?;
        tx.commit().await?;

        Ok(LedgerChange {
            value: removal,
            debts,
        })
    }

    // SETTLEMENT

    /// Ledger model: records a payment from the debtor to the lender and
    /// recomputes, which absorbs the payment into the balances.
    pub async fn create_payment(
        &self,
        debt_id: &str,
        paid_amount: f64,
    ) -> Result<LedgerChange<Payment>, SettleError> {
        info!("Creating payment of {} against debt {}", paid_amount, debt_id);
        self.require_model(SettlementModel::Ledger, "create_payment")?;
        self.validate_payment_amount("paid_amount", paid_amount)?;
        let group_id = self.locate_debt(debt_id).await?;

        let _guard = self.locks.acquire(&group_id).await;
        let mut tx = self.storage.begin().await?;
        let debt = tx
            .get_debt(debt_id)
            .await?
            .filter(|d| d.group_id == group_id)
            .ok_or_else(|| SettleError::DebtNotFound(debt_id.to_string()))?;
        if paid_amount > debt.amount {
            warn!(
                "Payment {} exceeds debt {} amount {}",
                paid_amount, debt.id, debt.amount
            );
            return Err(SettleError::PaymentExceedsDebt {
                debt_id: debt.id,
                amount: paid_amount,
                outstanding: debt.amount,
            });
        }

        let payment = Payment::new(&group_id, &debt.debtor_id, &debt.lender_id, paid_amount);
        tx.insert_payment(payment.clone()).await?;
        let debts = self.recompute_in(&mut tx, &group_id).await?;

        self.log_and_audit(
            &group_id,
            PAYMENT_CREATED,
            json!({
                "payment_id": payment.id,
                "debt_id": debt_id,
                "group_id": group_id,
                "payer_id": payment.payer_id,
                "payee_id": payment.payee_id,
                "amount": paid_amount
            }),
        )
        .await?;
        tx.commit().await?;

        Ok(LedgerChange {
            value: payment,
            debts,
        })
    }

    /// Paid-amount model: overwrites the debt's paid amount without a recompute.
    /// An increase is also written to the payment ledger as a side record.
    pub async fn update_debt_paid_amount(
        &self,
        debt_id: &str,
        new_paid_amount: f64,
    ) -> Result<PaidAmountUpdate, SettleError> {
        info!("Setting paid amount of debt {} to {}", debt_id, new_paid_amount);
        self.require_model(SettlementModel::PaidAmount, "update_debt_paid_amount")?;
        self.validate_payment_amount("paid_amount", new_paid_amount)?;
        let group_id = self.locate_debt(debt_id).await?;

        let _guard = self.locks.acquire(&group_id).await;
        let mut tx = self.storage.begin().await?;
        let mut debt = tx
            .get_debt(debt_id)
            .await?
            .filter(|d| d.group_id == group_id)
            .ok_or_else(|| SettleError::DebtNotFound(debt_id.to_string()))?;
        if new_paid_amount > debt.amount {
            warn!(
                "Paid amount {} exceeds debt {} amount {}",
                new_paid_amount, debt.id, debt.amount
            );
            return Err(SettleError::PaymentExceedsDebt {
                debt_id: debt.id,
                amount: new_paid_amount,
                outstanding: debt.amount,
            });
        }

        let delta = new_paid_amount - debt.paid_amount;
        debt.paid_amount = new_paid_amount;
        tx.update_debt(debt.clone()).await?;

        let payment = if delta > 0.0 {
            let payment = Payment::new(&group_id, &debt.debtor_id, &debt.lender_id, delta);
            tx.insert_payment(payment.clone()).await?;
            Some(payment)
        } else {
            debug!("Paid amount of debt {} moved by {}, no payment recorded", debt.id, delta);
            None
        };

        self.log_and_audit(
            &group_id,
            DEBT_PAID_AMOUNT_UPDATED,
            json!({
                "debt_id": debt.id,
                "group_id": group_id,
                "paid_amount": new_paid_amount,
                "delta": delta,
                "payment_id": payment.as_ref().map(|p| p.id.clone())
            }),
        )
        .await?;
        tx.commit().await?;

        Ok(PaidAmountUpdate { debt, payment })
    }

    // QUERIES

    /// Persisted debts ordered by lender then debtor. With `unpaid_only`, debts
    /// whose outstanding amount is dust are left out.
    pub async fn get_group_debts(&self, group_id: &str, unpaid_only: bool) -> Result<Vec<Debt>, SettleError> {
        let mut tx = self.storage.begin().await?;
        let mut debts = tx.list_debts(group_id).await?;
        if unpaid_only {
            debts.retain(|d| d.is_unpaid(self.config.dust_tolerance));
        }
        debts.sort_by(|a, b| {
            (a.lender_id.as_str(), a.debtor_id.as_str()).cmp(&(b.lender_id.as_str(), b.debtor_id.as_str()))
        });
        Ok(debts)
    }

    /// What the participant is still owed across the group's debts, negative
    /// when they owe.
    pub async fn get_net_balance(&self, group_id: &str, participant_id: &str) -> Result<f64, SettleError> {
        let mut tx = self.storage.begin().await?;
        let ledger = read_ledger(&mut tx, group_id).await?;
        if !ledger.has_participant(participant_id) {
            return Err(SettleError::ParticipantNotFound(participant_id.to_string()));
        }
        let debts = tx.list_debts(group_id).await?;
        Ok(net_from_debts(&debts, participant_id))
    }

    /// Balances straight from the ledger, without touching persisted debts.
    pub async fn get_group_balances(&self, group_id: &str) -> Result<Balances, SettleError> {
        let mut tx = self.storage.begin().await?;
        let ledger = read_ledger(&mut tx, group_id).await?;
        self.balances_of(&ledger)
    }

    pub async fn get_app_logs(&self) -> Result<Vec<AppLog>, SettleError> {
        self.logging.get_logs().await
    }

    /// Action history of one group. The group must exist.
    pub async fn get_group_logs(&self, group_id: &str) -> Result<Vec<AppLog>, SettleError> {
        let mut tx = self.storage.begin().await?;
        read_ledger(&mut tx, group_id).await?;
        drop(tx);
        self.logging.get_group_logs(group_id).await
    }

    // HELPERS

    async fn locate_expense(&self, expense_id: &str) -> Result<String, SettleError> {
        let mut tx = self.storage.begin().await?;
        tx.get_expense(expense_id)
            .await?
            .map(|e| e.group_id)
            .ok_or_else(|| SettleError::ExpenseNotFound(expense_id.to_string()))
    }

    // The debt is looked up again under the group lock; it may have been
    // regenerated in between, which surfaces as DebtNotFound.
    async fn locate_debt(&self, debt_id: &str) -> Result<String, SettleError> {
        let mut tx = self.storage.begin().await?;
        tx.get_debt(debt_id)
            .await?
            .map(|d| d.group_id)
            .ok_or_else(|| SettleError::DebtNotFound(debt_id.to_string()))
    }

    fn require_model(&self, model: SettlementModel, operation: &str) -> Result<(), SettleError> {
        if self.config.settlement_model != model {
            warn!(
                "Rejected {} under {} settlement model",
                operation, self.config.settlement_model
            );
            return Err(SettleError::SettlementModelMismatch {
                operation: operation.to_string(),
                active: self.config.settlement_model.to_string(),
            });
        }
        Ok(())
    }

    async fn log_and_audit(
        &self,
        group_id: &str,
        action: &str,
        details: serde_json::Value,
    ) -> Result<(), SettleError> {
        self.logging.log_action(action, details, Some(group_id)).await
    }

    fn validate_draft(&self, draft: &ExpenseDraft) -> Result<(), SettleError> {
        self.validate_amount_input("cost", draft.cost)?;
        self.validate_string_input("description", &draft.description, MAX_DESCRIPTION_LENGTH)?;

        if draft.splits.is_empty() {
            return Err(SettleError::InvalidSplit {
                cost: draft.cost,
                split_total: 0.0,
            });
        }
        for split in &draft.splits {
            if !split.amount.is_finite() || split.amount < 0.0 {
                return Err(SettleError::InvalidInput(
                    "splits".to_string(),
                    FieldError::new(
                        "splits",
                        "Invalid Split",
                        format!(
                            "Split for {} must be a non-negative finite amount",
                            split.participant_id
                        ),
                    ),
                ));
            }
        }

        let split_total: f64 = draft.splits.iter().map(|s| s.amount).sum();
        if (split_total - draft.cost).abs() > SPLIT_TOLERANCE {
            warn!(
                "Splits sum {} does not match cost {}",
                split_total, draft.cost
            );
            return Err(SettleError::InvalidSplit {
                cost: draft.cost,
                split_total,
            });
        }
        Ok(())
    }

    fn validate_draft_members(&self, ledger: &GroupLedger, draft: &ExpenseDraft) -> Result<(), SettleError> {
        if !ledger.has_participant(&draft.payer_id) {
            warn!("Payer {} not in group {}", draft.payer_id, ledger.group.id);
            return Err(SettleError::ParticipantNotFound(draft.payer_id.clone()));
        }
        let mut seen = HashSet::new();
        for split in &draft.splits {
            if !ledger.has_participant(&split.participant_id) || !seen.insert(split.participant_id.as_str()) {
                warn!(
                    "Split participant {} rejected for group {}",
                    split.participant_id, ledger.group.id
                );
                return Err(SettleError::InvalidSplitParticipant(split.participant_id.clone()));
            }
        }
        Ok(())
    }

    fn validate_string_input(&self, field: &str, value: &str, max_length: usize) -> Result<(), SettleError> {
        if value.trim().is_empty() {
            return Err(SettleError::InvalidInput(
                field.to_string(),
                FieldError::new(field, format!("Invalid {}", field), format!("{} cannot be empty", field)),
            ));
        }
        if value.len() > max_length {
            return Err(SettleError::InvalidInput(
                field.to_string(),
                FieldError::new(
                    field,
                    format!("{} Too Long", field),
                    format!("{} cannot exceed {} characters", field, max_length),
                ),
            ));
        }
        if value.chars().any(|c| c.is_control()) {
            return Err(SettleError::InvalidInput(
                field.to_string(),
                FieldError::new(
                    field,
                    format!("Invalid {}", field),
                    format!("{} contains invalid characters", field),
                ),
            ));
        }
        Ok(())
    }

    fn validate_amount_input(&self, field: &str, amount: f64) -> Result<(), SettleError> {
        if !amount.is_finite() {
            return Err(SettleError::InvalidInput(
                field.to_string(),
                FieldError::new(field, "Invalid Amount", "Amount must be a finite number"),
            ));
        }
        if amount <= 0.0 {
            return Err(SettleError::InvalidInput(
                field.to_string(),
                FieldError::new(field, "Invalid Amount", "Amount must be greater than 0"),
            ));
        }
        if amount > self.config.max_amount {
            return Err(SettleError::InvalidInput(
                field.to_string(),
                FieldError::new(
                    field,
                    "Amount Too Large",
                    format!("Amount cannot exceed {}", self.config.max_amount),
                ),
            ));
        }
        let cents = amount * 100.0;
        if (cents - cents.round()).abs() > 1e-6 {
            return Err(SettleError::InvalidInput(
                field.to_string(),
                FieldError::new(field, "Invalid Amount", "Amount cannot have more than 2 decimal places"),
            ));
        }
        Ok(())
    }

    // Payments settle derived debt amounts, which are not rounded to cents.
    fn validate_payment_amount(&self, field: &str, amount: f64) -> Result<(), SettleError> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(SettleError::InvalidInput(
                field.to_string(),
                FieldError::new(field, "Invalid Amount", "Amount must be a non-negative finite number"),
            ));
        }
        Ok(())
    }
}

/// Sum of outstanding amounts owed to `participant_id` minus those they owe.
pub fn net_from_debts(debts: &[Debt], participant_id: &str) -> f64 {
    debts.iter().fold(0.0, |net, debt| {
        if debt.lender_id == participant_id {
            net + debt.outstanding()
        } else if debt.debtor_id == participant_id {
            net - debt.outstanding()
        } else {
            net
        }
    })
}
