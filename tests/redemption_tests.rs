mod common;

use uuid::Uuid;

use points_ledger_api::{
    error::Error,
    models::{
        catalog::{CatalogItemPatch, PricingSettingsPatch, RewardMethod},
        redemption::{
            Destination, NewRedemption, RedemptionPatch, RedemptionQuery, RedemptionStatus,
            StatusFilter,
        },
        transaction::{TransactionQuery, TransactionType},
    },
    repositories::LedgerRepository,
    services::{admin_service, ledger_service, redemption_service},
};

async fn refunds(repo: &dyn LedgerRepository, user_id: Uuid) -> usize {
    ledger_service::history(repo, TransactionQuery::for_user(user_id))
        .await
        .unwrap()
        .iter()
        .filter(|t| t.kind == TransactionType::Refund)
        .count()
}

#[tokio::test]
async fn creation_debits_formula_price_and_inserts_pending() {
    let repo = common::repo();
    let config = common::config();
    let (user, session) = common::funded_user(&*repo, &config, "buyer@example.com", 500).await;
    let item = common::catalog_item(&*repo, RewardMethod::Freefire, 310, 0).await;

    let request = redemption_service::create_request(&*repo, &session, common::game_dto(item.id))
        .await
        .unwrap();

    assert_eq!(request.status, RedemptionStatus::Pending);
    assert_eq!(request.price_at_creation, 326);
    assert_eq!(request.account_id.as_deref(), Some("5512093"));
    assert_eq!(ledger_service::balance_of(&*repo, user.id).await.unwrap(), 174);

    let history = ledger_service::history(&*repo, TransactionQuery::for_user(user.id))
        .await
        .unwrap();
    let debits: Vec<_> = history
        .iter()
        .filter(|t| t.kind == TransactionType::RedemptionDebit)
        .collect();
    assert_eq!(debits.len(), 1);
    assert_eq!(debits[0].amount, -326);
    assert_eq!(debits[0].redemption_id, Some(request.id));

    let own = redemption_service::list_own(&*repo, &session).await.unwrap();
    assert_eq!(own.len(), 1);
    assert_eq!(own[0].id, request.id);
}

#[tokio::test]
async fn insufficient_balance_creates_nothing() {
    let repo = common::repo();
    let config = common::config();
    let (user, session) = common::funded_user(&*repo, &config, "short@example.com", 100).await;
    let item = common::catalog_item(&*repo, RewardMethod::Freefire, 310, 0).await;

    let err = redemption_service::create_request(&*repo, &session, common::game_dto(item.id))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InsufficientBalance { available: 100, required: 326 }));
    assert!(redemption_service::list_own(&*repo, &session).await.unwrap().is_empty());
    assert_eq!(common::transaction_count(&*repo, user.id).await, 1);
}

#[tokio::test]
async fn banned_user_is_blocked_without_side_effects() {
    let repo = common::repo();
    let config = common::config();
    let (_, admin) = common::admin(&*repo, &config).await;
    let (user, session) = common::funded_user(&*repo, &config, "banned@example.com", 500).await;
    let item = common::catalog_item(&*repo, RewardMethod::Pubg, 60, 0).await;

    admin_service::ban(&*repo, &admin, user.id, Some("chargeback".into()))
        .await
        .unwrap();

    // the session was issued before the ban; status is re-read from the store
    let err = redemption_service::create_request(&*repo, &session, common::game_dto(item.id))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::BannedAccount));
    assert_eq!(common::transaction_count(&*repo, user.id).await, 1);
    assert_eq!(ledger_service::balance_of(&*repo, user.id).await.unwrap(), 500);
}

#[tokio::test]
async fn disabled_or_missing_item_is_not_found() {
    let repo = common::repo();
    let config = common::config();
    let (_, session) = common::funded_user(&*repo, &config, "item@example.com", 500).await;
    let item = common::catalog_item(&*repo, RewardMethod::Freefire, 100, 0).await;
    repo.update_catalog_item(
        item.id,
        CatalogItemPatch {
            enabled: Some(false),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    for id in [item.id, Uuid::new_v4()] {
        let err = redemption_service::create_request(&*repo, &session, common::game_dto(id))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}

#[tokio::test]
async fn destination_fields_are_validated_per_method() {
    let repo = common::repo();
    let config = common::config();
    let (user, session) = common::funded_user(&*repo, &config, "wallet@example.com", 500).await;
    let cash = common::catalog_item(&*repo, RewardMethod::VodafoneCash, 50, 0).await;
    let game = common::catalog_item(&*repo, RewardMethod::Freefire, 100, 0).await;

    let err = redemption_service::create_request(&*repo, &session, common::wallet_dto(cash.id, "0101234567"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let mut dto = common::game_dto(game.id);
    dto.email = Some("  ".into());
    let err = redemption_service::create_request(&*repo, &session, dto).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    // method in the body must match the item
    let err = redemption_service::create_request(&*repo, &session, common::wallet_dto(game.id, "01012345678"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    assert_eq!(common::transaction_count(&*repo, user.id).await, 1);

    let request = redemption_service::create_request(&*repo, &session, common::wallet_dto(cash.id, "01012345678"))
        .await
        .unwrap();
    assert_eq!(request.price_at_creation, 100);
    assert_eq!(request.wallet_number.as_deref(), Some("01012345678"));
    assert!(request.account_id.is_none());
}

#[tokio::test]
async fn zero_price_is_rejected() {
    let repo = common::repo();
    let config = common::config();
    let (_, session) = common::funded_user(&*repo, &config, "free@example.com", 500).await;
    let item = common::catalog_item(&*repo, RewardMethod::Freefire, 0, 0).await;

    let err = redemption_service::create_request(&*repo, &session, common::game_dto(item.id))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn explicit_price_and_frozen_price_survive_settings_changes() {
    let repo = common::repo();
    let config = common::config();
    let (_, admin) = common::admin(&*repo, &config).await;
    let (user, session) = common::funded_user(&*repo, &config, "frozen@example.com", 1000).await;
    let fixed = common::catalog_item(&*repo, RewardMethod::Freefire, 310, 50).await;
    let formula = common::catalog_item(&*repo, RewardMethod::Freefire, 100, 0).await;

    let patch = PricingSettingsPatch {
        freefire_per100_points: Some(400.0),
        ..Default::default()
    };
    let before = redemption_service::create_request(&*repo, &session, common::game_dto(formula.id))
        .await
        .unwrap();
    assert_eq!(before.price_at_creation, 105);

    admin_service::update_settings(&*repo, &admin, patch).await.unwrap();

    let explicit = redemption_service::create_request(&*repo, &session, common::game_dto(fixed.id))
        .await
        .unwrap();
    assert_eq!(explicit.price_at_creation, 50);

    let rejected = redemption_service::resolve(&*repo, &admin, before.id, RedemptionStatus::Rejected, None)
        .await
        .unwrap();
    assert_eq!(rejected.price_at_creation, 105);
    assert_eq!(
        ledger_service::balance_of(&*repo, user.id).await.unwrap(),
        1000 - 50
    );
}

#[tokio::test]
async fn rejection_refunds_exactly_once() {
    let repo = common::repo();
    let config = common::config();
    let (_, admin) = common::admin(&*repo, &config).await;
    let (user, session) = common::funded_user(&*repo, &config, "refund@example.com", 600).await;
    let item = common::catalog_item(&*repo, RewardMethod::Pubg, 325, 0).await;

    let request = redemption_service::create_request(&*repo, &session, common::game_dto(item.id))
        .await
        .unwrap();
    assert_eq!(request.price_at_creation, 569);
    assert_eq!(ledger_service::balance_of(&*repo, user.id).await.unwrap(), 31);

    let rejected = redemption_service::resolve(
        &*repo,
        &admin,
        request.id,
        RedemptionStatus::Rejected,
        Some("wrong player id".into()),
    )
    .await
    .unwrap();
    assert_eq!(rejected.status, RedemptionStatus::Rejected);
    assert_eq!(rejected.resolved_by, Some(admin.user_id));
    assert_eq!(rejected.admin_note.as_deref(), Some("wrong player id"));
    assert_eq!(ledger_service::balance_of(&*repo, user.id).await.unwrap(), 600);

    for status in [RedemptionStatus::Rejected, RedemptionStatus::Approved, RedemptionStatus::Pending] {
        let err = redemption_service::resolve(&*repo, &admin, request.id, status, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidStateTransition { .. }));
    }

    assert_eq!(refunds(&*repo, user.id).await, 1);
    assert_eq!(ledger_service::balance_of(&*repo, user.id).await.unwrap(), 600);
}

#[tokio::test]
async fn approval_has_no_ledger_effect_and_is_terminal() {
    let repo = common::repo();
    let config = common::config();
    let (_, admin) = common::admin(&*repo, &config).await;
    let (user, session) = common::funded_user(&*repo, &config, "approve@example.com", 200).await;
    let item = common::catalog_item(&*repo, RewardMethod::Freefire, 100, 0).await;

    let request = redemption_service::create_request(&*repo, &session, common::game_dto(item.id))
        .await
        .unwrap();
    let count = common::transaction_count(&*repo, user.id).await;

    let approved = redemption_service::resolve(&*repo, &admin, request.id, RedemptionStatus::Approved, None)
        .await
        .unwrap();
    assert_eq!(approved.status, RedemptionStatus::Approved);
    assert_eq!(common::transaction_count(&*repo, user.id).await, count);

    let err = redemption_service::resolve(&*repo, &admin, request.id, RedemptionStatus::Rejected, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidStateTransition {
            from: RedemptionStatus::Approved,
            to: RedemptionStatus::Rejected
        }
    ));
    assert_eq!(refunds(&*repo, user.id).await, 0);
    assert_eq!(ledger_service::balance_of(&*repo, user.id).await.unwrap(), 95);
}

#[tokio::test]
async fn notes_attach_without_changing_state() {
    let repo = common::repo();
    let config = common::config();
    let (_, admin) = common::admin(&*repo, &config).await;
    let (_, session) = common::funded_user(&*repo, &config, "note@example.com", 200).await;
    let item = common::catalog_item(&*repo, RewardMethod::Freefire, 100, 0).await;
    let request = redemption_service::create_request(&*repo, &session, common::game_dto(item.id))
        .await
        .unwrap();

    let noted = redemption_service::patch(
        &*repo,
        &admin,
        request.id,
        RedemptionPatch {
            status: None,
            admin_note: Some("checking with supplier".into()),
        },
    )
    .await
    .unwrap();
    assert_eq!(noted.status, RedemptionStatus::Pending);
    assert_eq!(noted.admin_note.as_deref(), Some("checking with supplier"));

    let approved = redemption_service::patch(
        &*repo,
        &admin,
        request.id,
        RedemptionPatch {
            status: Some(RedemptionStatus::Approved),
            admin_note: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(approved.admin_note.as_deref(), Some("checking with supplier"));

    // notes still allowed on terminal requests
    let noted = redemption_service::annotate(&*repo, &admin, request.id, "delivered".into())
        .await
        .unwrap();
    assert_eq!(noted.status, RedemptionStatus::Approved);
    assert_eq!(noted.admin_note.as_deref(), Some("delivered"));

    let err = redemption_service::patch(&*repo, &admin, request.id, RedemptionPatch::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn only_admins_resolve_requests() {
    let repo = common::repo();
    let config = common::config();
    let (_, session) = common::funded_user(&*repo, &config, "self@example.com", 200).await;
    let item = common::catalog_item(&*repo, RewardMethod::Freefire, 100, 0).await;
    let request = redemption_service::create_request(&*repo, &session, common::game_dto(item.id))
        .await
        .unwrap();

    let err = redemption_service::resolve(&*repo, &session, request.id, RedemptionStatus::Rejected, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Forbidden));

    let err = redemption_service::resolve(&*repo, &session, Uuid::new_v4(), RedemptionStatus::Approved, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Forbidden));
}

#[tokio::test]
async fn admin_listing_filters_by_status() {
    let repo = common::repo();
    let config = common::config();
    let (_, admin) = common::admin(&*repo, &config).await;
    let (_, session) = common::funded_user(&*repo, &config, "lister@example.com", 1000).await;
    let item = common::catalog_item(&*repo, RewardMethod::Freefire, 100, 0).await;

    let first = redemption_service::create_request(&*repo, &session, common::game_dto(item.id))
        .await
        .unwrap();
    redemption_service::create_request(&*repo, &session, common::game_dto(item.id))
        .await
        .unwrap();
    redemption_service::resolve(&*repo, &admin, first.id, RedemptionStatus::Approved, None)
        .await
        .unwrap();

    let query = |status| RedemptionQuery {
        status,
        user_id: None,
    };
    let all = redemption_service::list_all(&*repo, &admin, query(StatusFilter::All)).await.unwrap();
    let pending = redemption_service::list_all(&*repo, &admin, query(StatusFilter::Pending)).await.unwrap();
    let approved = redemption_service::list_all(&*repo, &admin, query(StatusFilter::Approved)).await.unwrap();

    assert_eq!(all.len(), 2);
    assert_eq!(pending.len(), 1);
    assert_eq!(approved.len(), 1);
    assert_eq!(approved[0].id, first.id);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_rejections_refund_once() {
    let repo = common::repo();
    let config = common::config();
    let (_, admin) = common::admin(&*repo, &config).await;
    let (user, session) = common::funded_user(&*repo, &config, "double@example.com", 200).await;
    let item = common::catalog_item(&*repo, RewardMethod::Freefire, 100, 0).await;
    let request = redemption_service::create_request(&*repo, &session, common::game_dto(item.id))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let repo = repo.clone();
        let admin = admin.clone();
        let id = request.id;
        handles.push(tokio::spawn(async move {
            redemption_service::resolve(&*repo, &admin, id, RedemptionStatus::Rejected, None).await
        }));
    }
    let mut ok = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            ok += 1;
        }
    }

    assert_eq!(ok, 1);
    assert_eq!(refunds(&*repo, user.id).await, 1);
    assert_eq!(ledger_service::balance_of(&*repo, user.id).await.unwrap(), 200);
}

#[tokio::test]
async fn refund_past_the_balance_limit_leaves_request_pending() {
    let repo = common::repo();
    let config = common::config();
    let (_, admin) = common::admin(&*repo, &config).await;
    let (user, session) = common::funded_user(&*repo, &config, "whale@example.com", 500).await;
    let item = common::catalog_item(&*repo, RewardMethod::Pubg, 60, 0).await;
    let request = redemption_service::create_request(&*repo, &session, common::game_dto(item.id))
        .await
        .unwrap();
    admin_service::set_points(&*repo, &admin, user.id, i64::MAX, None)
        .await
        .unwrap();

    let err = redemption_service::resolve(&*repo, &admin, request.id, RedemptionStatus::Rejected, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    let stored = repo.get_redemption(request.id).await.unwrap().unwrap();
    assert_eq!(stored.status, RedemptionStatus::Pending);
    assert_eq!(refunds(&*repo, user.id).await, 0);
    assert_eq!(ledger_service::balance_of(&*repo, user.id).await.unwrap(), i64::MAX);

    // with room on the balance the same rejection goes through
    admin_service::adjust_points(&*repo, &admin, user.id, -1000, None)
        .await
        .unwrap();
    redemption_service::resolve(&*repo, &admin, request.id, RedemptionStatus::Rejected, None)
        .await
        .unwrap();
    assert_eq!(
        ledger_service::balance_of(&*repo, user.id).await.unwrap(),
        i64::MAX - 1000 + 105
    );
}

#[tokio::test]
async fn store_refuses_unaffordable_request_without_inserting_it() {
    let repo = common::repo();
    let config = common::config();
    let (user, _) = common::funded_user(&*repo, &config, "direct@example.com", 100).await;
    let item = common::catalog_item(&*repo, RewardMethod::Freefire, 310, 0).await;

    let err = repo
        .create_redemption(NewRedemption {
            user_id: user.id,
            catalog_item_id: item.id,
            method: item.method,
            label: item.label.clone(),
            qty: item.qty,
            price: 326,
            destination: Destination::GameAccount {
                account_id: "5512093".into(),
                email: "player@example.com".into(),
            },
        })
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InsufficientBalance { .. }));
    assert!(repo
        .list_redemptions(&RedemptionQuery {
            user_id: Some(user.id),
            ..Default::default()
        })
        .await
        .unwrap()
        .is_empty());
    assert_eq!(common::transaction_count(&*repo, user.id).await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn deleting_an_item_races_creation_without_orphans() {
    for round in 0..20 {
        let repo = common::repo();
        let config = common::config();
        let (_, admin) = common::admin(&*repo, &config).await;
        let (user, session) =
            common::funded_user(&*repo, &config, &format!("racer{round}@example.com"), 1000).await;
        let item_id = common::catalog_item(&*repo, RewardMethod::Freefire, 100, 0).await.id;

        let create = {
            let repo = repo.clone();
            tokio::spawn(async move {
                redemption_service::create_request(&*repo, &session, common::game_dto(item_id)).await
            })
        };
        let remove = {
            let repo = repo.clone();
            tokio::spawn(async move { admin_service::remove_catalog_item(&*repo, &admin, item_id).await })
        };
        let created = create.await.unwrap();
        let removal = remove.await.unwrap().unwrap();

        match created {
            Ok(request) => {
                // a request exists, so the item must have been retired instead
                assert!(removal.retired, "round {round}");
                assert!(repo.get_catalog_item(request.catalog_item_id).await.unwrap().is_some());
            }
            Err(err) => {
                assert!(matches!(err, Error::NotFound(_)), "round {round}: {err}");
                assert!(removal.deleted);
                assert_eq!(ledger_service::balance_of(&*repo, user.id).await.unwrap(), 1000);
            }
        }
    }
}
