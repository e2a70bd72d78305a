mod common;

use serde_json::json;
use uuid::Uuid;

use points_ledger_api::{
    error::Error,
    models::{
        auth::Actor,
        transaction::{TransactionQuery, TransactionType},
    },
    services::ledger_service,
};

#[tokio::test]
async fn balance_is_the_sum_of_transactions() {
    let repo = common::repo();
    let config = common::config();
    let (user, _) = common::funded_user(&*repo, &config, "sum@example.com", 100).await;
    let admin = Actor::Admin(Uuid::new_v4());

    ledger_service::debit(&*repo, user.id, 30, TransactionType::Debit, "spend", Actor::System, json!({}))
        .await
        .unwrap();
    ledger_service::apply_delta(&*repo, user.id, -20, admin, "fix").await.unwrap();
    ledger_service::set_absolute(&*repo, user.id, 75, admin, "reset").await.unwrap();
    ledger_service::credit(&*repo, user.id, 5, TransactionType::Credit, "bonus", Actor::System, json!({}))
        .await
        .unwrap();

    let balance = ledger_service::balance_of(&*repo, user.id).await.unwrap();
    let history = ledger_service::history(&*repo, TransactionQuery::for_user(user.id))
        .await
        .unwrap();

    assert_eq!(balance, 80);
    assert_eq!(history.iter().map(|t| t.amount).sum::<i64>(), balance);
    assert!(history.iter().all(|t| t.balance_after >= 0));
}

#[tokio::test]
async fn failed_debit_appends_nothing() {
    let repo = common::repo();
    let config = common::config();
    let (user, _) = common::funded_user(&*repo, &config, "poor@example.com", 10).await;

    let err = ledger_service::debit(&*repo, user.id, 11, TransactionType::Debit, "too much", Actor::System, json!({}))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InsufficientBalance { available: 10, required: 11 }));
    assert_eq!(common::transaction_count(&*repo, user.id).await, 1);
    assert_eq!(ledger_service::balance_of(&*repo, user.id).await.unwrap(), 10);

    let err = ledger_service::apply_delta(&*repo, user.id, -11, Actor::System, "too much")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InsufficientBalance { .. }));
}

#[tokio::test]
async fn unknown_user_and_bad_amounts_are_rejected() {
    let repo = common::repo();
    let config = common::config();
    let (user, _) = common::funded_user(&*repo, &config, "amounts@example.com", 0).await;

    let err = ledger_service::credit(&*repo, Uuid::new_v4(), 5, TransactionType::Credit, "x", Actor::System, json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnknownUser(_)));

    for amount in [0, -3] {
        let err = ledger_service::credit(&*repo, user.id, amount, TransactionType::Credit, "x", Actor::System, json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    let err = ledger_service::credit(&*repo, user.id, 5, TransactionType::RedemptionDebit, "x", Actor::System, json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let err = ledger_service::set_absolute(&*repo, user.id, -1, Actor::System, "x")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn set_absolute_records_zero_delta_and_zero_empties_balance() {
    let repo = common::repo();
    let config = common::config();
    let (user, _) = common::funded_user(&*repo, &config, "abs@example.com", 40).await;
    let admin = Actor::Admin(Uuid::new_v4());

    let tx = ledger_service::set_absolute(&*repo, user.id, 40, admin, "no-op audit")
        .await
        .unwrap();
    assert_eq!(tx.amount, 0);
    assert_eq!(tx.kind, TransactionType::ManualAdjust);
    assert_eq!(common::transaction_count(&*repo, user.id).await, 2);

    let tx = ledger_service::zero(&*repo, user.id, admin, "fraud").await.unwrap();
    assert_eq!(tx.amount, -40);
    assert_eq!(tx.balance_after, 0);
    assert_eq!(tx.actor, admin);
    assert_eq!(tx.reason, "fraud");
    assert_eq!(ledger_service::balance_of(&*repo, user.id).await.unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_admin_deltas_accumulate() {
    let repo = common::repo();
    let config = common::config();
    let (user, _) = common::funded_user(&*repo, &config, "deltas@example.com", 250).await;
    let admin_a = Actor::Admin(Uuid::new_v4());
    let admin_b = Actor::Admin(Uuid::new_v4());
    let user_id = user.id;

    let mut handles = Vec::new();
    for _ in 0..50 {
        let repo_a = repo.clone();
        handles.push(tokio::spawn(async move {
            ledger_service::apply_delta(&*repo_a, user_id, 10, admin_a, "plus").await
        }));
        let repo_b = repo.clone();
        handles.push(tokio::spawn(async move {
            ledger_service::apply_delta(&*repo_b, user_id, -5, admin_b, "minus").await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let balance = ledger_service::balance_of(&*repo, user.id).await.unwrap();
    // every -5 is covered even if all of them land first
    assert_eq!(balance, 250 + 50 * 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_debits_never_overdraw() {
    let repo = common::repo();
    let config = common::config();
    let (user, _) = common::funded_user(&*repo, &config, "race@example.com", 100).await;
    let user_id = user.id;

    let mut handles = Vec::new();
    for _ in 0..50 {
        let repo = repo.clone();
        handles.push(tokio::spawn(async move {
            ledger_service::debit(&*repo, user_id, 7, TransactionType::Debit, "race", Actor::System, json!({}))
                .await
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(Error::InsufficientBalance { .. }) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(succeeded, 14);
    assert_eq!(ledger_service::balance_of(&*repo, user.id).await.unwrap(), 2);
    let history = ledger_service::history(&*repo, TransactionQuery::for_user(user.id))
        .await
        .unwrap();
    assert!(history.iter().all(|t| t.balance_after >= 0));
}
