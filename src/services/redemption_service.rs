use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::Error;
use crate::models::{
    auth::Session,
    redemption::{
        CreateRedemptionDto, Destination, NewRedemption, RedemptionPatch, RedemptionQuery,
        RedemptionRequest, RedemptionStatus, Resolution,
    },
    user::UserStatus,
};
use crate::repositories::LedgerRepository;
use crate::services::pricing_service;

/// Validates the request, freezes its price and debits it together with
/// inserting the pending request.
pub async fn create_request(
    repo: &dyn LedgerRepository,
    session: &Session,
    dto: CreateRedemptionDto,
) -> Result<RedemptionRequest, Error> {
    let user = repo
        .get_user(session.user_id)
        .await?
        .ok_or(Error::UnknownUser(session.user_id))?;
    if user.status == UserStatus::Banned {
        warn!(user_id = %user.id, "banned user attempted a redemption");
        return Err(Error::BannedAccount);
    }

    let item = repo
        .get_catalog_item(dto.catalog_item_id)
        .await?
        .filter(|item| item.enabled)
        .ok_or_else(|| Error::NotFound("reward is not available".into()))?;

    if let Some(method) = dto.method {
        if method != item.method {
            return Err(Error::Validation(format!(
                "reward {} is redeemed via {}, not {}",
                item.id, item.method, method
            )));
        }
    }

    let destination = Destination::from_dto(item.method, &dto)?;
    let price = pricing_service::current_price(repo, &item).await?;
    if price <= 0 {
        return Err(Error::Validation("reward has no valid price".into()));
    }

    let (request, tx) = repo
        .create_redemption(NewRedemption {
            user_id: user.id,
            catalog_item_id: item.id,
            method: item.method,
            label: item.label.clone(),
            qty: item.qty,
            price,
            destination,
        })
        .await
        .inspect_err(|e| debug!(user_id = %user.id, error = %e, "redemption refused"))?;

    info!(
        user_id = %user.id,
        request_id = %request.id,
        method = %request.method,
        price,
        balance = tx.balance_after,
        "redemption requested"
    );
    Ok(request)
}

pub async fn list_own(
    repo: &dyn LedgerRepository,
    session: &Session,
) -> Result<Vec<RedemptionRequest>, Error> {
    repo.list_redemptions(&RedemptionQuery {
        user_id: Some(session.user_id),
        ..Default::default()
    })
    .await
}

pub async fn list_all(
    repo: &dyn LedgerRepository,
    session: &Session,
    query: RedemptionQuery,
) -> Result<Vec<RedemptionRequest>, Error> {
    session.require_admin()?;
    repo.list_redemptions(&query).await
}

/// Moves a pending request to `approved` or `rejected`; a rejection refunds
/// exactly the frozen price in the same unit.
pub async fn resolve(
    repo: &dyn LedgerRepository,
    session: &Session,
    id: Uuid,
    status: RedemptionStatus,
    note: Option<String>,
) -> Result<RedemptionRequest, Error> {
    session.require_admin()?;
    let (request, refund) = repo
        .resolve_redemption(
            id,
            Resolution {
                status,
                actor_id: session.user_id,
                note: note.map(|n| n.trim().to_string()),
            },
        )
        .await
        .inspect_err(|e| debug!(request_id = %id, error = %e, "transition refused"))?;

    match refund {
        Some(tx) => info!(
            request_id = %id,
            user_id = %request.user_id,
            refunded = tx.amount,
            balance = tx.balance_after,
            admin = %session.user_id,
            "redemption rejected"
        ),
        None => info!(request_id = %id, admin = %session.user_id, status = %request.status, "redemption resolved"),
    }
    Ok(request)
}

/// Attaches an admin note without touching the state machine.
pub async fn annotate(
    repo: &dyn LedgerRepository,
    session: &Session,
    id: Uuid,
    note: String,
) -> Result<RedemptionRequest, Error> {
    session.require_admin()?;
    repo.annotate_redemption(id, note.trim().to_string()).await
}

pub async fn patch(
    repo: &dyn LedgerRepository,
    session: &Session,
    id: Uuid,
    patch: RedemptionPatch,
) -> Result<RedemptionRequest, Error> {
    match (patch.status, patch.admin_note) {
        (Some(status), note) => resolve(repo, session, id, status, note).await,
        (None, Some(note)) => annotate(repo, session, id, note).await,
        (None, None) => Err(Error::Validation("nothing to update".into())),
    }
}
