use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::config::Config;
use crate::error::Error;
use crate::models::{
    admin::AdminUserPatch,
    audit::AuditEntry,
    auth::{Actor, Session},
    catalog::{
        CatalogItem, CatalogItemPatch, CatalogRemoval, NewCatalogItem, PricingSettings,
        PricingSettingsPatch,
    },
    transaction::{BalanceChange, Transaction, TransactionQuery},
    user::{Page, Role, User, UserQuery, UserStatus, UserUpdate},
};
use crate::repositories::LedgerRepository;
use crate::services::{ledger_service, referral_service};

pub const DEFAULT_AUDIT_LIMIT: u32 = 100;
pub const MAX_AUDIT_LIMIT: u32 = 500;

fn reason_or(reason: Option<String>, fallback: &str) -> String {
    reason
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

async fn require_user(repo: &dyn LedgerRepository, id: Uuid) -> Result<User, Error> {
    repo.get_user(id).await?.ok_or(Error::UnknownUser(id))
}

// ---- users ----

pub async fn list_users(
    repo: &dyn LedgerRepository,
    session: &Session,
    query: UserQuery,
) -> Result<Page<User>, Error> {
    session.require_admin()?;
    repo.list_users(&query.normalized()).await
}

/// Applies a role/status change and its audit entry as one unit.
pub async fn update_user(
    repo: &dyn LedgerRepository,
    session: &Session,
    id: Uuid,
    update: UserUpdate,
    reason: &str,
) -> Result<User, Error> {
    session.require_admin()?;
    if id == session.user_id {
        if update.status == Some(UserStatus::Banned) {
            return Err(Error::Validation("admins cannot ban themselves".into()));
        }
        if update.role == Some(Role::User) {
            return Err(Error::Validation("admins cannot drop their own admin role".into()));
        }
    }

    let action = match (update.status, update.role, &update.balance) {
        (Some(UserStatus::Banned), None, None) => "ban",
        (Some(UserStatus::Active), None, None) => "unban",
        (None, Some(_), None) => "role",
        _ => "update",
    };
    let set_to = update.balance.as_ref().and_then(|entry| match entry.change {
        BalanceChange::SetTo(points) => Some(points),
        _ => None,
    });
    let audit = AuditEntry::new(
        session.user_id,
        Some(id),
        action,
        reason,
        json!({
            "status": update.status,
            "role": update.role,
            "points": set_to,
        }),
    );

    let user = repo.update_user(id, update, audit).await?;
    info!(admin = %session.user_id, user_id = %id, action, status = %user.status, role = %user.role, "user updated");
    Ok(user)
}

pub async fn ban(
    repo: &dyn LedgerRepository,
    session: &Session,
    id: Uuid,
    reason: Option<String>,
) -> Result<User, Error> {
    let update = UserUpdate {
        status: Some(UserStatus::Banned),
        ..Default::default()
    };
    update_user(repo, session, id, update, &reason_or(reason, "banned by admin")).await
}

pub async fn unban(
    repo: &dyn LedgerRepository,
    session: &Session,
    id: Uuid,
    reason: Option<String>,
) -> Result<User, Error> {
    let update = UserUpdate {
        status: Some(UserStatus::Active),
        ..Default::default()
    };
    update_user(repo, session, id, update, &reason_or(reason, "unbanned by admin")).await
}

pub async fn adjust_points(
    repo: &dyn LedgerRepository,
    session: &Session,
    id: Uuid,
    delta: i64,
    reason: Option<String>,
) -> Result<Transaction, Error> {
    session.require_admin()?;
    ledger_service::apply_delta(
        repo,
        id,
        delta,
        Actor::Admin(session.user_id),
        &reason_or(reason, "admin adjustment"),
    )
    .await
}

pub async fn set_points(
    repo: &dyn LedgerRepository,
    session: &Session,
    id: Uuid,
    points: i64,
    reason: Option<String>,
) -> Result<Transaction, Error> {
    session.require_admin()?;
    ledger_service::set_absolute(
        repo,
        id,
        points,
        Actor::Admin(session.user_id),
        &reason_or(reason, "admin set balance"),
    )
    .await
}

pub async fn zero_points(
    repo: &dyn LedgerRepository,
    session: &Session,
    id: Uuid,
    reason: Option<String>,
) -> Result<Transaction, Error> {
    session.require_admin()?;
    ledger_service::zero(
        repo,
        id,
        Actor::Admin(session.user_id),
        &reason_or(reason, "admin zeroed balance"),
    )
    .await
}

/// Status, role and `points` (an absolute set) are applied as one unit.
pub async fn patch_user(
    repo: &dyn LedgerRepository,
    session: &Session,
    id: Uuid,
    patch: AdminUserPatch,
) -> Result<User, Error> {
    session.require_admin()?;
    if patch.points.is_none() && patch.status.is_none() && patch.role.is_none() {
        return Err(Error::Validation("nothing to update".into()));
    }
    let reason = reason_or(patch.reason, "admin update");
    let balance = patch
        .points
        .map(|points| {
            ledger_service::set_absolute_entry(id, points, Actor::Admin(session.user_id), &reason)
        })
        .transpose()?;
    require_user(repo, id).await?;

    if patch.status.is_none() && patch.role.is_none() {
        if let Some(points) = patch.points {
            set_points(repo, session, id, points, Some(reason)).await?;
        }
        return require_user(repo, id).await;
    }

    let update = UserUpdate {
        role: patch.role,
        status: patch.status,
        balance,
    };
    update_user(repo, session, id, update, &reason).await
}

/// Re-runs referral accounting for a user. Already credited pairs are a no-op.
pub async fn trigger_referral_credit(
    repo: &dyn LedgerRepository,
    config: &Config,
    session: &Session,
    referred_user_id: Uuid,
) -> Result<Option<Transaction>, Error> {
    session.require_admin()?;
    referral_service::credit_referrer(
        repo,
        referred_user_id,
        config.referral_bonus_points,
        Actor::Admin(session.user_id),
    )
    .await
}

pub async fn list_transactions(
    repo: &dyn LedgerRepository,
    session: &Session,
    query: TransactionQuery,
) -> Result<Vec<Transaction>, Error> {
    session.require_admin()?;
    ledger_service::history(repo, query).await
}

// ---- catalog ----

fn validate_catalog_fields(label: &str, qty: i64, price_points: i64) -> Result<(), Error> {
    if label.trim().is_empty() {
        return Err(Error::Validation("label is required".into()));
    }
    if qty < 0 {
        return Err(Error::Validation("qty must not be negative".into()));
    }
    if price_points < 0 {
        return Err(Error::Validation("pricePoints must not be negative".into()));
    }
    Ok(())
}

async fn audit_after(
    repo: &dyn LedgerRepository,
    session: &Session,
    action: &str,
    detail: serde_json::Value,
) -> Result<(), Error> {
    repo.record_audit(AuditEntry::new(session.user_id, None, action, "", detail))
        .await
}

pub async fn list_catalog(
    repo: &dyn LedgerRepository,
    session: &Session,
) -> Result<Vec<CatalogItem>, Error> {
    session.require_admin()?;
    repo.list_catalog(true).await
}

pub async fn create_catalog_item(
    repo: &dyn LedgerRepository,
    session: &Session,
    mut new: NewCatalogItem,
) -> Result<CatalogItem, Error> {
    session.require_admin()?;
    validate_catalog_fields(&new.label, new.qty, new.price_points)?;
    new.label = new.label.trim().to_string();

    let item = repo.insert_catalog_item(new).await?;
    audit_after(repo, session, "catalog.create", json!({ "itemId": item.id, "label": item.label })).await?;
    info!(admin = %session.user_id, item_id = %item.id, method = %item.method, "catalog item created");
    Ok(item)
}

pub async fn update_catalog_item(
    repo: &dyn LedgerRepository,
    session: &Session,
    id: Uuid,
    patch: CatalogItemPatch,
) -> Result<CatalogItem, Error> {
    session.require_admin()?;
    let current = repo
        .get_catalog_item(id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("catalog item {id}")))?;
    validate_catalog_fields(
        patch.label.as_deref().unwrap_or(&current.label),
        patch.qty.unwrap_or(current.qty),
        patch.price_points.unwrap_or(current.price_points),
    )?;

    let item = repo.update_catalog_item(id, patch).await?;
    audit_after(repo, session, "catalog.update", json!({ "itemId": id, "enabled": item.enabled })).await?;
    Ok(item)
}

pub async fn remove_catalog_item(
    repo: &dyn LedgerRepository,
    session: &Session,
    id: Uuid,
) -> Result<CatalogRemoval, Error> {
    session.require_admin()?;
    let removal = repo.remove_catalog_item(id).await?;
    audit_after(
        repo,
        session,
        "catalog.delete",
        json!({ "itemId": id, "deleted": removal.deleted, "retired": removal.retired }),
    )
    .await?;
    info!(admin = %session.user_id, item_id = %id, retired = removal.retired, "catalog item removed");
    Ok(removal)
}

// ---- settings ----

pub async fn settings(
    repo: &dyn LedgerRepository,
    session: &Session,
) -> Result<PricingSettings, Error> {
    session.require_admin()?;
    repo.pricing_settings().await
}

pub async fn update_settings(
    repo: &dyn LedgerRepository,
    session: &Session,
    patch: PricingSettingsPatch,
) -> Result<PricingSettings, Error> {
    session.require_admin()?;
    patch.validate()?;
    let settings = repo.update_pricing_settings(patch).await?;
    audit_after(repo, session, "settings.update", serde_json::to_value(&settings)?).await?;
    info!(admin = %session.user_id, ?settings, "pricing settings updated");
    Ok(settings)
}

// ---- audit ----

pub async fn list_audit(
    repo: &dyn LedgerRepository,
    session: &Session,
    limit: Option<u32>,
) -> Result<Vec<AuditEntry>, Error> {
    session.require_admin()?;
    let limit = limit.unwrap_or(DEFAULT_AUDIT_LIMIT).clamp(1, MAX_AUDIT_LIMIT);
    repo.list_audit(limit).await
}
