use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::auth::Actor;

/// Presence of a row means the referrer was already paid for this user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralCredit {
    pub referrer_id: Uuid,
    pub referred_user_id: Uuid,
    pub credited_transaction_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ReferralGrant {
    pub referrer_id: Uuid,
    pub referred_user_id: Uuid,
    pub amount: i64,
    pub actor: Actor,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralStats {
    pub referred_count: u64,
    pub referral_points: i64,
    pub my_referral_code: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferredUser {
    pub id: Uuid,
    pub email: String,
    pub points: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ReferredUsers {
    pub items: Vec<ReferredUser>,
}
