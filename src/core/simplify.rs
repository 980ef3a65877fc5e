use crate::core::models::{Balances, SettlementEdge};
use log::debug;

/// Turns net balances into settlement edges with a single greedy pass.
///
/// Creditors (balance above `tolerance`) and debtors (below `-tolerance`) are
/// walked in ascending participant-id order with one cursor each. Every step
/// settles the smaller of the two remainders and moves past whichever side is
/// now within `tolerance` of zero, both on a tie. Participants inside the dust
/// band never appear in an edge.
///
/// The result has at most `creditors + debtors - 1` edges. That is not
/// guaranteed to be the global minimum.
pub fn simplify_debts(balances: &Balances, tolerance: f64) -> Vec<SettlementEdge> {
    // BTreeMap iteration keeps both lists sorted by participant id.
    let mut creditors: Vec<(&str, f64)> = balances
        .iter()
        .filter(|(_, bal)| **bal > tolerance)
        .map(|(id, bal)| (id.as_str(), *bal))
        .collect();
    let mut debtors: Vec<(&str, f64)> = balances
        .iter()
        .filter(|(_, bal)| **bal < -tolerance)
        .map(|(id, bal)| (id.as_str(), -*bal))
        .collect();

    let mut simplified = Vec::new();
    let mut i = 0;
    let mut j = 0;

    while i < creditors.len() && j < debtors.len() {
        let (creditor_id, credit_amt) = creditors[i];
        let (debtor_id, debt_amt) = debtors[j];

        let settled_amt = credit_amt.min(debt_amt);
        if settled_amt > tolerance {
            simplified.push(SettlementEdge {
                lender_id: creditor_id.to_string(),
                debtor_id: debtor_id.to_string(),
                amount: settled_amt,
            });
        }

        creditors[i].1 = credit_amt - settled_amt;
        debtors[j].1 = debt_amt - settled_amt;

        if creditors[i].1 <= tolerance {
            i += 1;
        }
        if debtors[j].1 <= tolerance {
            j += 1;
        }
    }

    debug!("Simplified debts: {:?}", simplified);
    simplified
}

/// Applies `edges` to a copy of `balances`, as if every debtor paid their lender.
pub fn settle_with(balances: &Balances, edges: &[SettlementEdge]) -> Balances {
    let mut settled = balances.clone();
    for edge in edges {
        if let Some(bal) = settled.get_mut(&edge.lender_id) {
            *bal -= edge.amount;
        }
        if let Some(bal) = settled.get_mut(&edge.debtor_id) {
            *bal += edge.amount;
        }
    }
    settled
}
