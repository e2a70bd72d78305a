use tracing::{debug, info};
use uuid::Uuid;

use crate::error::Error;
use crate::models::{
    auth::{Actor, Session},
    referral::{ReferralGrant, ReferralStats, ReferredUser, ReferredUsers},
    transaction::Transaction,
};
use crate::repositories::LedgerRepository;

pub const DEFAULT_LATEST_LIMIT: u32 = 10;
pub const MAX_LATEST_LIMIT: u32 = 100;

/// Pays the referrer of `referred_user_id` once. Repeated triggers for the
/// same pair are a no-op and return `None`, as does a user with no referrer.
pub async fn credit_referrer(
    repo: &dyn LedgerRepository,
    referred_user_id: Uuid,
    amount: i64,
    actor: Actor,
) -> Result<Option<Transaction>, Error> {
    let referred = repo
        .get_user(referred_user_id)
        .await?
        .ok_or(Error::UnknownUser(referred_user_id))?;
    let Some(referrer_id) = referred.referred_by else {
        return Ok(None);
    };
    if amount <= 0 {
        debug!(%referrer_id, "referral bonus disabled, nothing credited");
        return Ok(None);
    }

    match repo
        .grant_referral_bonus(ReferralGrant {
            referrer_id,
            referred_user_id,
            amount,
            actor,
        })
        .await
    {
        Ok(tx) => {
            info!(
                %referrer_id,
                %referred_user_id,
                amount = tx.amount,
                balance = tx.balance_after,
                "referral bonus credited"
            );
            Ok(Some(tx))
        }
        Err(Error::DuplicateReferralCredit) => {
            debug!(%referrer_id, %referred_user_id, "referral already credited");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

pub async fn stats(repo: &dyn LedgerRepository, session: &Session) -> Result<ReferralStats, Error> {
    repo.referral_stats(session.user_id).await
}

pub async fn latest(
    repo: &dyn LedgerRepository,
    session: &Session,
    limit: Option<u32>,
) -> Result<ReferredUsers, Error> {
    let limit = limit
        .unwrap_or(DEFAULT_LATEST_LIMIT)
        .clamp(1, MAX_LATEST_LIMIT);
    let items = repo
        .list_referred_users(session.user_id, limit)
        .await?
        .into_iter()
        .map(|user| ReferredUser {
            id: user.id,
            email: user.email,
            points: user.points,
            created_at: user.created_at,
        })
        .collect();
    Ok(ReferredUsers { items })
}
