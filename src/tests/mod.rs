mod recompute_tests;

use crate::config::{EngineConfig, SettlementModel};
use crate::core::models::{Debt, Group, Participant, Split, SplitPolicy};
use crate::core::services::{ExpenseDraft, SettlementService};
use crate::infrastructure::logging::in_memory::InMemoryLogging;
use crate::infrastructure::storage::in_memory::InMemoryStorage;

pub type TestService = SettlementService<InMemoryLogging, InMemoryStorage>;

pub fn create_test_service(model: SettlementModel) -> TestService {
    let _ = env_logger::try_init();
    let config = EngineConfig::default().with_settlement_model(model);
    SettlementService::with_config(InMemoryStorage::new(), InMemoryLogging::new(), config)
}

/// Creates a group whose participant ids are the given names.
pub async fn seed_group(service: &TestService, names: &[&str]) -> String {
    let group = service.storage().add_group(Group::new("Trip")).await;
    for name in names {
        service
            .storage()
            .add_participant(Participant {
                id: name.to_string(),
                group_id: group.id.clone(),
                name: name.to_string(),
            })
            .await
            .unwrap();
    }
    group.id
}

pub fn draft(payer: &str, cost: f64, splits: &[(&str, f64)]) -> ExpenseDraft {
    ExpenseDraft {
        payer_id: payer.to_string(),
        cost,
        description: "Dinner".to_string(),
        split_policy: SplitPolicy::Amount,
        splits: splits.iter().map(|(id, amount)| Split::new(id, *amount)).collect(),
    }
}

pub fn equal_draft(payer: &str, cost: f64, members: &[&str]) -> ExpenseDraft {
    let share = cost / members.len() as f64;
    ExpenseDraft {
        split_policy: SplitPolicy::Equal,
        ..draft(payer, cost, &members.iter().map(|m| (*m, share)).collect::<Vec<_>>())
    }
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {}, got {}",
        expected,
        actual
    );
}

/// `(lender, debtor, amount)` in lender/debtor order, ignoring debt ids.
pub fn triples(debts: &[Debt]) -> Vec<(String, String, f64)> {
    let mut out: Vec<_> = debts
        .iter()
        .map(|d| (d.lender_id.clone(), d.debtor_id.clone(), d.amount))
        .collect();
    out.sort_by(|a, b| (&a.0, &a.1).cmp(&(&b.0, &b.1)));
    out
}
