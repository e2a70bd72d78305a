#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use chrono::{Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use points_ledger_api::{
    models::{
        auth::{Actor, Session},
        catalog::{CatalogItem, NewCatalogItem, RewardMethod},
        redemption::CreateRedemptionDto,
        transaction::TransactionType,
        user::{RegisterUser, User},
    },
    repositories::{LedgerRepository, MemoryLedgerRepository},
    routes,
    services::{auth_service, ledger_service, offer_service::DisabledOfferProvider},
    AppState, Config,
};

pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const PASSWORD: &str = "hunter22";

pub fn config() -> Config {
    let mut config = Config::new("test-secret");
    config.bcrypt_cost = 4;
    config.admin_emails = vec![ADMIN_EMAIL.to_string()];
    config
}

pub fn repo() -> Arc<MemoryLedgerRepository> {
    Arc::new(MemoryLedgerRepository::default())
}

pub fn session_for(user: &User) -> Session {
    Session::from_user(user, Utc::now() + Duration::hours(1))
}

pub async fn register(
    repo: &dyn LedgerRepository,
    config: &Config,
    email: &str,
    referral_code: Option<&str>,
) -> User {
    auth_service::register(
        repo,
        config,
        RegisterUser {
            email: email.to_string(),
            password: PASSWORD.to_string(),
            referral_code: referral_code.map(str::to_string),
        },
    )
    .await
    .unwrap()
}

pub async fn admin(repo: &dyn LedgerRepository, config: &Config) -> (User, Session) {
    let user = register(repo, config, ADMIN_EMAIL, None).await;
    let session = session_for(&user);
    (user, session)
}

pub async fn funded_user(
    repo: &dyn LedgerRepository,
    config: &Config,
    email: &str,
    points: i64,
) -> (User, Session) {
    let user = register(repo, config, email, None).await;
    if points > 0 {
        ledger_service::credit(
            repo,
            user.id,
            points,
            TransactionType::Credit,
            "offer completed",
            Actor::System,
            json!({}),
        )
        .await
        .unwrap();
    }
    let user = repo.get_user(user.id).await.unwrap().unwrap();
    let session = session_for(&user);
    (user, session)
}

pub async fn catalog_item(
    repo: &dyn LedgerRepository,
    method: RewardMethod,
    qty: i64,
    price_points: i64,
) -> CatalogItem {
    repo.insert_catalog_item(NewCatalogItem {
        method,
        label: format!("{qty} {method}"),
        qty,
        price_points,
        enabled: true,
    })
    .await
    .unwrap()
}

pub fn game_dto(catalog_item_id: Uuid) -> CreateRedemptionDto {
    CreateRedemptionDto {
        catalog_item_id,
        method: None,
        wallet_number: None,
        wallet_name: None,
        account_id: Some("5512093".into()),
        email: Some("player@example.com".into()),
    }
}

pub fn wallet_dto(catalog_item_id: Uuid, wallet_number: &str) -> CreateRedemptionDto {
    CreateRedemptionDto {
        catalog_item_id,
        method: Some(RewardMethod::VodafoneCash),
        wallet_number: Some(wallet_number.into()),
        wallet_name: Some("Mona Adel".into()),
        account_id: None,
        email: None,
    }
}

pub async fn transaction_count(repo: &dyn LedgerRepository, user_id: Uuid) -> usize {
    ledger_service::history(
        repo,
        points_ledger_api::models::transaction::TransactionQuery::for_user(user_id),
    )
    .await
    .unwrap()
    .len()
}

pub fn app(repo: Arc<MemoryLedgerRepository>, config: Config) -> Router {
    routes::app(AppState::new(repo, config, Arc::new(DisabledOfferProvider)))
}
