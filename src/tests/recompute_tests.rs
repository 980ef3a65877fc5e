use crate::config::SettlementModel;
use crate::constants::{DEBTS_RECOMPUTED, EXPENSE_ADDED, PARTICIPANT_DELETED};
use crate::core::errors::{ErrorKind, SettleError};
use crate::core::models::{Expense, Participant, Split, SplitPolicy};
use crate::infrastructure::storage::{Storage, StorageTransaction};
use crate::tests::{assert_close, create_test_service, draft, equal_draft, seed_group, triples};
use chrono::Utc;

#[tokio::test]
async fn test_add_expense_creates_debts() {
    let service = create_test_service(SettlementModel::Ledger);
    let group_id = seed_group(&service, &["alice", "bob", "carol"]).await;

    let change = service
        .add_expense(&group_id, equal_draft("alice", 90.0, &["alice", "bob", "carol"]))
        .await
        .unwrap();

    assert_eq!(change.value.cost, 90.0);
    assert_eq!(
        triples(&change.debts),
        vec![
            ("alice".to_string(), "bob".to_string(), 30.0),
            ("alice".to_string(), "carol".to_string(), 30.0),
        ]
    );

    let balances = service.get_group_balances(&group_id).await.unwrap();
    assert_close(balances["alice"], 60.0);
    assert_close(balances["bob"], -30.0);
    assert_close(balances["carol"], -30.0);
}

#[tokio::test]
async fn test_two_expenses_collapse_to_one_edge() {
    let service = create_test_service(SettlementModel::Ledger);
    let group_id = seed_group(&service, &["alice", "bob"]).await;

    service
        .add_expense(&group_id, draft("alice", 100.0, &[("alice", 50.0), ("bob", 50.0)]))
        .await
        .unwrap();
    let change = service
        .add_expense(&group_id, draft("bob", 40.0, &[("alice", 20.0), ("bob", 20.0)]))
        .await
        .unwrap();

    assert_eq!(
        triples(&change.debts),
        vec![("alice".to_string(), "bob".to_string(), 30.0)]
    );
    assert_close(service.get_net_balance(&group_id, "alice").await.unwrap(), 30.0);
    assert_close(service.get_net_balance(&group_id, "bob").await.unwrap(), -30.0);
}

#[tokio::test]
async fn test_recompute_is_idempotent() {
    let service = create_test_service(SettlementModel::Ledger);
    let group_id = seed_group(&service, &["alice", "bob", "carol", "dave"]).await;
    service
        .add_expense(&group_id, equal_draft("alice", 100.0, &["alice", "bob", "carol", "dave"]))
        .await
        .unwrap();
    service
        .add_expense(&group_id, draft("bob", 30.0, &[("carol", 10.0), ("dave", 20.0)]))
        .await
        .unwrap();

    let first = service.recompute(&group_id).await.unwrap();
    let second = service.recompute(&group_id).await.unwrap();

    assert_eq!(triples(&first), triples(&second));
    // Debt ids are regenerated on every pass.
    assert!(first.iter().all(|d| second.iter().all(|s| s.id != d.id)));
    let logs = service.get_app_logs().await.unwrap();
    assert_eq!(logs.iter().filter(|l| l.action == DEBTS_RECOMPUTED).count(), 2);
}

#[tokio::test]
async fn test_update_expense_replaces_debts() {
    let service = create_test_service(SettlementModel::Ledger);
    let group_id = seed_group(&service, &["alice", "bob"]).await;
    let created = service
        .add_expense(&group_id, draft("alice", 50.0, &[("bob", 50.0)]))
        .await
        .unwrap();

    let updated = service
        .update_expense(&created.value.id, draft("bob", 20.0, &[("alice", 20.0)]))
        .await
        .unwrap();

    assert_eq!(updated.value.id, created.value.id);
    assert_eq!(updated.value.created_at, created.value.created_at);
    assert_eq!(
        triples(&updated.debts),
        vec![("bob".to_string(), "alice".to_string(), 20.0)]
    );
    assert_eq!(service.get_group_debts(&group_id, false).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_delete_expense_clears_debts() {
    let service = create_test_service(SettlementModel::Ledger);
    let group_id = seed_group(&service, &["alice", "bob"]).await;
    let created = service
        .add_expense(&group_id, draft("alice", 50.0, &[("bob", 50.0)]))
        .await
        .unwrap();

    let deleted = service.delete_expense(&created.value.id).await.unwrap();
    assert_eq!(deleted.value.id, created.value.id);
    assert!(deleted.debts.is_empty());
    assert!(service.get_group_debts(&group_id, false).await.unwrap().is_empty());

    let err = service.delete_expense(&created.value.id).await.unwrap_err();
    assert!(matches!(err, SettleError::ExpenseNotFound(_)));
}

#[tokio::test]
async fn test_delete_participant_keeps_remaining_ledger_balanced() {
    let service = create_test_service(SettlementModel::Ledger);
    let group_id = seed_group(&service, &["alice", "bob", "carol"]).await;
    service
        .add_expense(&group_id, equal_draft("alice", 90.0, &["alice", "bob", "carol"]))
        .await
        .unwrap();
    service
        .add_expense(&group_id, equal_draft("carol", 60.0, &["alice", "bob", "carol"]))
        .await
        .unwrap();

    let change = service.delete_participant(&group_id, "bob").await.unwrap();

    assert!(change.value.participant_deleted);
    assert_eq!(change.value.splits_removed, 2);
    assert_eq!(change.value.expenses_deleted, 0);
    assert!(change.debts.iter().all(|d| !d.mentions("bob")));
    assert_eq!(
        triples(&change.debts),
        vec![("alice".to_string(), "carol".to_string(), 10.0)]
    );

    let balances = service.get_group_balances(&group_id).await.unwrap();
    assert!(!balances.contains_key("bob"));
    assert!(balances.values().sum::<f64>().abs() <= 0.01);

    let logs = service.get_app_logs().await.unwrap();
    assert!(logs.iter().any(|l| l.action == PARTICIPANT_DELETED));
}

#[tokio::test]
async fn test_delete_payer_removes_their_expenses() {
    let service = create_test_service(SettlementModel::Ledger);
    let group_id = seed_group(&service, &["alice", "bob", "carol"]).await;
    service
        .add_expense(&group_id, equal_draft("alice", 90.0, &["alice", "bob", "carol"]))
        .await
        .unwrap();
    service
        .add_expense(&group_id, equal_draft("carol", 60.0, &["alice", "bob", "carol"]))
        .await
        .unwrap();

    let change = service.delete_participant(&group_id, "alice").await.unwrap();

    assert_eq!(change.value.expenses_deleted, 1);
    assert_eq!(
        triples(&change.debts),
        vec![("carol".to_string(), "bob".to_string(), 20.0)]
    );

    let err = service.delete_participant(&group_id, "alice").await.unwrap_err();
    assert!(matches!(err, SettleError::ParticipantNotFound(_)));
}

#[tokio::test]
async fn test_storage_failure_rolls_back() {
    let service = create_test_service(SettlementModel::Ledger);
    let group_id = seed_group(&service, &["alice", "bob"]).await;
    let before = service
        .add_expense(&group_id, draft("alice", 50.0, &[("bob", 50.0)]))
        .await
        .unwrap()
        .debts;

    service.storage().set_fail_debt_writes(true);
    let err = service
        .add_expense(&group_id, draft("bob", 80.0, &[("alice", 80.0)]))
        .await
        .unwrap_err();
    service.storage().set_fail_debt_writes(false);

    assert_eq!(err.kind(), ErrorKind::StorageFailure);
    let mut tx = service.storage().begin().await.unwrap();
    let ledger = tx.load_group_ledger(&group_id).await.unwrap();
    assert_eq!(ledger.expenses.len(), 1);
    drop(tx);

    let after = service.get_group_debts(&group_id, false).await.unwrap();
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].id, before[0].id);
    let logs = service.get_group_logs(&group_id).await.unwrap();
    assert_eq!(logs.iter().filter(|l| l.action == EXPENSE_ADDED).count(), 1);
}

#[tokio::test]
async fn test_unbalanced_ledger_is_rejected_without_writing() {
    let service = create_test_service(SettlementModel::Ledger);
    let group_id = seed_group(&service, &["alice", "bob"]).await;
    let before = service
        .add_expense(&group_id, draft("alice", 50.0, &[("bob", 50.0)]))
        .await
        .unwrap()
        .debts;

    // Written behind the engine's back with splits short of the cost.
    let now = Utc::now();
    let mut tx = service.storage().begin().await.unwrap();
    tx.save_expense(Expense {
        id: "broken".to_string(),
        group_id: group_id.clone(),
        payer_id: "bob".to_string(),
        cost: 70.0,
        description: "Taxi".to_string(),
        split_policy: SplitPolicy::Amount,
        splits: vec![Split::new("alice", 20.0)],
        created_at: now,
        updated_at: now,
    })
    .await
    .unwrap();
    tx.commit().await.unwrap();
    drop(tx);

    let err = service.recompute(&group_id).await.unwrap_err();
    assert!(matches!(err, SettleError::ConsistencyViolation { .. }));
    assert_eq!(err.kind(), ErrorKind::ConsistencyViolation);

    let after = service.get_group_debts(&group_id, false).await.unwrap();
    assert_eq!(after[0].id, before[0].id);
}

#[tokio::test]
async fn test_expense_validation() {
    let service = create_test_service(SettlementModel::Ledger);
    let group_id = seed_group(&service, &["alice", "bob"]).await;

    let err = service
        .add_expense(&group_id, draft("alice", 0.0, &[("bob", 0.0)]))
        .await
        .unwrap_err();
    assert!(matches!(err, SettleError::InvalidInput(ref field, _) if field == "cost"));

    let err = service
        .add_expense(&group_id, draft("alice", -5.0, &[("bob", -5.0)]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let err = service
        .add_expense(&group_id, draft("alice", 10.005, &[("bob", 10.005)]))
        .await
        .unwrap_err();
    assert!(matches!(err, SettleError::InvalidInput(..)));

    let err = service
        .add_expense(&group_id, draft("alice", 50.0, &[("bob", 30.0)]))
        .await
        .unwrap_err();
    assert!(matches!(err, SettleError::InvalidSplit { .. }));

    let err = service
        .add_expense(&group_id, draft("alice", 50.0, &[]))
        .await
        .unwrap_err();
    assert!(matches!(err, SettleError::InvalidSplit { .. }));

    let err = service
        .add_expense(&group_id, draft("mallory", 50.0, &[("bob", 50.0)]))
        .await
        .unwrap_err();
    assert!(matches!(err, SettleError::ParticipantNotFound(ref id) if id == "mallory"));

    let err = service
        .add_expense(&group_id, draft("alice", 50.0, &[("bob", 25.0), ("mallory", 25.0)]))
        .await
        .unwrap_err();
    assert!(matches!(err, SettleError::InvalidSplitParticipant(ref id) if id == "mallory"));

    let err = service
        .add_expense(&group_id, draft("alice", 50.0, &[("bob", 25.0), ("bob", 25.0)]))
        .await
        .unwrap_err();
    assert!(matches!(err, SettleError::InvalidSplitParticipant(_)));

    let mut blank = draft("alice", 50.0, &[("bob", 50.0)]);
    blank.description = "   ".to_string();
    let err = service.add_expense(&group_id, blank).await.unwrap_err();
    assert!(matches!(err, SettleError::InvalidInput(ref field, _) if field == "description"));

    let err = service
        .add_expense("no-such-group", draft("alice", 50.0, &[("bob", 50.0)]))
        .await
        .unwrap_err();
    assert!(matches!(err, SettleError::GroupNotFound(_)));
    assert!(err.is_not_found());

    assert!(service.get_group_debts(&group_id, false).await.unwrap().is_empty());
    assert!(service.get_app_logs().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_rounded_thirds_are_accepted() {
    let service = create_test_service(SettlementModel::Ledger);
    let group_id = seed_group(&service, &["alice", "bob", "carol"]).await;

    let change = service
        .add_expense(&group_id, draft("alice", 100.0, &[("alice", 33.33), ("bob", 33.33), ("carol", 33.34)]))
        .await
        .unwrap();

    assert_eq!(change.debts.len(), 2);
    let balances = service.get_group_balances(&group_id).await.unwrap();
    assert!(balances.values().sum::<f64>().abs() <= 0.01);
}

#[tokio::test]
async fn test_split_rounding_accumulates_across_expenses() {
    let service = create_test_service(SettlementModel::Ledger);
    let group_id = seed_group(&service, &["alice", "bob", "carol"]).await;
    let splits = [("alice", 3.33), ("bob", 3.33), ("carol", 3.331)];

    let mut ids = Vec::new();
    for payer in ["alice", "bob", "carol", "alice"] {
        let change = service
            .add_expense(&group_id, draft(payer, 10.0, &splits))
            .await
            .unwrap();
        ids.push(change.value.id);
    }

    let change = service
        .update_expense(&ids[0], draft("carol", 10.0, &splits))
        .await
        .unwrap();
    assert!(!change.debts.is_empty());

    let balances = service.get_group_balances(&group_id).await.unwrap();
    let drift: f64 = balances.values().sum();
    assert!(drift > 0.03 && drift < 0.04, "drift {}", drift);
}

#[tokio::test]
async fn test_net_balance_queries() {
    let service = create_test_service(SettlementModel::Ledger);
    let group_id = seed_group(&service, &["alice", "bob", "carol"]).await;
    service
        .add_expense(&group_id, equal_draft("alice", 90.0, &["alice", "bob", "carol"]))
        .await
        .unwrap();

    assert_close(service.get_net_balance(&group_id, "alice").await.unwrap(), 60.0);
    assert_close(service.get_net_balance(&group_id, "carol").await.unwrap(), -30.0);

    let err = service.get_net_balance(&group_id, "mallory").await.unwrap_err();
    assert!(matches!(err, SettleError::ParticipantNotFound(_)));
    let err = service.get_group_debts("no-such-group", false).await.unwrap_err();
    assert!(matches!(err, SettleError::GroupNotFound(_)));
}

#[tokio::test]
async fn test_new_participant_starts_settled() {
    let service = create_test_service(SettlementModel::Ledger);
    let group_id = seed_group(&service, &["alice", "bob"]).await;
    service
        .add_expense(&group_id, draft("alice", 50.0, &[("bob", 50.0)]))
        .await
        .unwrap();

    let newcomer = service
        .storage()
        .add_participant(Participant::new(&group_id, "Nina"))
        .await
        .unwrap();

    assert_eq!(service.get_net_balance(&group_id, &newcomer.id).await.unwrap(), 0.0);
    let balances = service.get_group_balances(&group_id).await.unwrap();
    assert_eq!(balances[&newcomer.id], 0.0);
    assert_eq!(service.recompute(&group_id).await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_expenses_on_one_group() {
    let service = create_test_service(SettlementModel::Ledger);
    let group_id = seed_group(&service, &["alice", "bob", "carol"]).await;

    let payers = ["alice", "bob", "carol"];
    let futures = (0..12).map(|i| {
        let payer = payers[i % payers.len()];
        let cost = 10.0 * (i as f64 + 1.0);
        service.add_expense(&group_id, equal_draft(payer, cost, &payers))
    });
    let results = futures::future::join_all(futures).await;
    assert!(results.iter().all(|r| r.is_ok()));

    let persisted = service.get_group_debts(&group_id, false).await.unwrap();
    let fresh = service.recompute(&group_id).await.unwrap();
    assert_eq!(triples(&persisted), triples(&fresh));

    let mut tx = service.storage().begin().await.unwrap();
    assert_eq!(tx.load_group_ledger(&group_id).await.unwrap().expenses.len(), 12);
}
