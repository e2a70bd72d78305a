use serde::Deserialize;

use crate::models::user::{Role, UserStatus};

/// Partial update of a user from the admin console. `points` sets the
/// balance to an absolute value through the ledger.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminUserPatch {
    pub points: Option<i64>,
    pub status: Option<UserStatus>,
    pub role: Option<Role>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PointsAdjustment {
    pub delta: i64,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminReason {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<u32>,
}
