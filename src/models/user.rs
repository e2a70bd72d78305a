use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;
use crate::models::transaction::LedgerEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(Error::Validation(format!("unknown role '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Banned,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Banned => "banned",
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(UserStatus::Active),
            "banned" => Ok(UserStatus::Banned),
            other => Err(Error::Validation(format!("unknown status '{other}'"))),
        }
    }
}

/// A registered account. `points` mirrors the ledger and is refreshed in the
/// same unit as every ledger append; the transactions remain authoritative.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub points: i64,
    pub role: Role,
    pub status: UserStatus,
    pub referral_code: String,
    pub referred_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Login lookup result; the hash never leaves the auth service.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub referral_code: String,
    pub referred_by: Option<Uuid>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterUser {
    pub email: String,
    pub password: String,
    #[serde(default, alias = "ref")]
    pub referral_code: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginUser {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfileDto {
    pub id: Uuid,
    pub email: String,
    pub points: i64,
    pub role: Role,
    pub status: UserStatus,
    pub my_referral_code: String,
    pub referred_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserProfileDto {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            points: user.points,
            role: user.role,
            status: user.status,
            my_referral_code: user.referral_code,
            referred_by: user.referred_by,
            created_at: user.created_at,
        }
    }
}

/// Role/status change applied by an admin together with its audit entry.
/// `balance` is appended in the same unit; if it fails nothing is applied.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub role: Option<Role>,
    pub status: Option<UserStatus>,
    pub balance: Option<LedgerEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub q: Option<String>,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    20
}

impl Default for UserQuery {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
            q: None,
        }
    }
}

impl UserQuery {
    pub const MAX_LIMIT: u32 = 100;

    pub fn normalized(mut self) -> Self {
        self.page = self.page.max(1);
        self.limit = self.limit.clamp(1, Self::MAX_LIMIT);
        self.q = self
            .q
            .map(|q| q.trim().to_lowercase())
            .filter(|q| !q.is_empty());
        self
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub limit: u32,
    pub total: u64,
}
