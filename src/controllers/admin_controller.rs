use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use axum_macros::debug_handler;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::Error;
use crate::models::{
    admin::{AdminReason, AdminUserPatch, LimitQuery, PointsAdjustment},
    audit::AuditEntry,
    auth::Session,
    catalog::{
        CatalogItem, CatalogItemPatch, CatalogRemoval, NewCatalogItem, PricingSettings,
        PricingSettingsPatch,
    },
    redemption::{RedemptionPatch, RedemptionQuery, RedemptionRequest},
    transaction::{Transaction, TransactionQuery},
    user::{Page, User, UserQuery},
};
use crate::services::{admin_service, redemption_service};
use crate::state::AppState;

fn reason(body: Option<Json<AdminReason>>) -> Option<String> {
    body.and_then(|Json(b)| b.reason)
}

// GET /admin/users
pub async fn list_users(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Page<User>>, Error> {
    Ok(Json(admin_service::list_users(state.repo(), &session, query).await?))
}

// PATCH /admin/users/:id
#[debug_handler]
pub async fn patch_user(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
    Json(patch): Json<AdminUserPatch>,
) -> Result<Json<User>, Error> {
    Ok(Json(admin_service::patch_user(state.repo(), &session, id, patch).await?))
}

// POST /admin/users/:id/points
#[debug_handler]
pub async fn adjust_points(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
    Json(payload): Json<PointsAdjustment>,
) -> Result<Json<Transaction>, Error> {
    let tx =
        admin_service::adjust_points(state.repo(), &session, id, payload.delta, payload.reason)
            .await?;
    Ok(Json(tx))
}

// POST /admin/users/:id/zero
pub async fn zero_points(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
    body: Option<Json<AdminReason>>,
) -> Result<Json<Transaction>, Error> {
    let tx = admin_service::zero_points(state.repo(), &session, id, reason(body)).await?;
    Ok(Json(tx))
}

// POST /admin/users/:id/ban
pub async fn ban_user(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
    body: Option<Json<AdminReason>>,
) -> Result<Json<User>, Error> {
    Ok(Json(admin_service::ban(state.repo(), &session, id, reason(body)).await?))
}

// POST /admin/users/:id/unban
pub async fn unban_user(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
    body: Option<Json<AdminReason>>,
) -> Result<Json<User>, Error> {
    Ok(Json(admin_service::unban(state.repo(), &session, id, reason(body)).await?))
}

// POST /admin/users/:id/referral-credit
pub async fn referral_credit(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, Error> {
    let credited =
        admin_service::trigger_referral_credit(state.repo(), &state.config, &session, id).await?;
    Ok(Json(json!({
        "credited": credited.is_some(),
        "transaction": credited,
    })))
}

// GET /admin/withdrawals
pub async fn list_withdrawals(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(query): Query<RedemptionQuery>,
) -> Result<Json<Vec<RedemptionRequest>>, Error> {
    Ok(Json(redemption_service::list_all(state.repo(), &session, query).await?))
}

// PATCH /admin/withdrawals/:id
#[debug_handler]
pub async fn patch_withdrawal(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
    Json(patch): Json<RedemptionPatch>,
) -> Result<Json<RedemptionRequest>, Error> {
    Ok(Json(redemption_service::patch(state.repo(), &session, id, patch).await?))
}

// GET /admin/transactions
pub async fn list_transactions(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(query): Query<TransactionQuery>,
) -> Result<Json<Vec<Transaction>>, Error> {
    Ok(Json(admin_service::list_transactions(state.repo(), &session, query).await?))
}

// GET /admin/rewards
pub async fn list_rewards(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<Vec<CatalogItem>>, Error> {
    Ok(Json(admin_service::list_catalog(state.repo(), &session).await?))
}

// POST /admin/rewards
pub async fn create_reward(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(payload): Json<NewCatalogItem>,
) -> Result<(StatusCode, Json<CatalogItem>), Error> {
    let item = admin_service::create_catalog_item(state.repo(), &session, payload).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

// PATCH /admin/rewards/:id
pub async fn update_reward(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
    Json(patch): Json<CatalogItemPatch>,
) -> Result<Json<CatalogItem>, Error> {
    Ok(Json(admin_service::update_catalog_item(state.repo(), &session, id, patch).await?))
}

// DELETE /admin/rewards/:id
pub async fn delete_reward(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
) -> Result<Json<CatalogRemoval>, Error> {
    Ok(Json(admin_service::remove_catalog_item(state.repo(), &session, id).await?))
}

// GET /admin/settings
pub async fn get_settings(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<PricingSettings>, Error> {
    Ok(Json(admin_service::settings(state.repo(), &session).await?))
}

// PATCH /admin/settings
pub async fn update_settings(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(patch): Json<PricingSettingsPatch>,
) -> Result<Json<PricingSettings>, Error> {
    Ok(Json(admin_service::update_settings(state.repo(), &session, patch).await?))
}

// GET /admin/audit
pub async fn list_audit(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<AuditEntry>>, Error> {
    Ok(Json(admin_service::list_audit(state.repo(), &session, query.limit).await?))
}
