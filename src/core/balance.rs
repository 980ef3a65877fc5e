use crate::core::errors::SettleError;
use crate::core::models::{Balances, GroupLedger};
use log::{debug, error};

/// Reduces a ledger to one signed balance per participant.
///
/// Every participant starts at zero. The payer of an expense is credited its
/// cost and each split debits its participant. With `include_payments` each
/// payment credits its payer and debits its payee; the paid-amount settlement
/// model leaves payments out because it settles debts in place instead.
///
/// A row naming someone outside the group fails with `UnknownParticipant`.
pub fn aggregate_balances(ledger: &GroupLedger, include_payments: bool) -> Result<Balances, SettleError> {
    let group_id = ledger.group.id.as_str();
    let mut balances: Balances = ledger
        .participants
        .iter()
        .map(|p| (p.id.clone(), 0.0))
        .collect();

    for expense in &ledger.expenses {
        apply(&mut balances, group_id, &expense.payer_id, expense.cost)?;
        for split in &expense.splits {
            apply(&mut balances, group_id, &split.participant_id, -split.amount)?;
        }
    }

    if include_payments {
        for payment in &ledger.payments {
            apply(&mut balances, group_id, &payment.payer_id, payment.amount)?;
            apply(&mut balances, group_id, &payment.payee_id, -payment.amount)?;
        }
    }

    debug!("Balances calculated for group {}: {:?}", group_id, balances);
    Ok(balances)
}

fn apply(balances: &mut Balances, group_id: &str, participant_id: &str, delta: f64) -> Result<(), SettleError> {
    match balances.get_mut(participant_id) {
        Some(balance) => {
            *balance += delta;
            Ok(())
        }
        None => {
            error!(
                "Ledger row in group {} references unknown participant {}",
                group_id, participant_id
            );
            Err(SettleError::UnknownParticipant {
                group_id: group_id.to_string(),
                participant_id: participant_id.to_string(),
            })
        }
    }
}

pub fn balance_total(balances: &Balances) -> f64 {
    balances.values().sum()
}

/// Every cost paid by someone is owed by someone, so balances must cancel out.
pub fn check_zero_sum(group_id: &str, balances: &Balances, tolerance: f64) -> Result<(), SettleError> {
    let drift = balance_total(balances);
    if drift.abs() > tolerance || !drift.is_finite() {
        error!(
            "Zero-sum check failed for group {}: drift {} over {} balances",
            group_id,
            drift,
            balances.len()
        );
        return Err(SettleError::ConsistencyViolation {
            group_id: group_id.to_string(),
            drift,
        });
    }
    Ok(())
}
