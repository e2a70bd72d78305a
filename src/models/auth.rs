use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;
use crate::models::user::{Role, User, UserStatus};

/// Authenticated caller, resolved server-side from a token on every request.
/// Role and status come from the store, never from the token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    pub status: UserStatus,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn from_user(user: &User, expires_at: DateTime<Utc>) -> Self {
        Self {
            user_id: user.id,
            email: user.email.clone(),
            role: user.role,
            status: user.status,
            expires_at,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> Result<(), Error> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(Error::Forbidden)
        }
    }

    pub fn actor(&self) -> Actor {
        match self.role {
            Role::Admin => Actor::Admin(self.user_id),
            Role::User => Actor::User(self.user_id),
        }
    }
}

/// Who caused a ledger movement. Stored as `system`, `user:<id>` or `admin:<id>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    System,
    User(Uuid),
    Admin(Uuid),
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actor::System => f.write_str("system"),
            Actor::User(id) => write!(f, "user:{id}"),
            Actor::Admin(id) => write!(f, "admin:{id}"),
        }
    }
}

impl FromStr for Actor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "system" {
            return Ok(Actor::System);
        }
        let (kind, id) = s
            .split_once(':')
            .ok_or_else(|| Error::Validation(format!("malformed actor '{s}'")))?;
        let id = Uuid::parse_str(id)
            .map_err(|_| Error::Validation(format!("malformed actor '{s}'")))?;
        match kind {
            "user" => Ok(Actor::User(id)),
            "admin" => Ok(Actor::Admin(id)),
            _ => Err(Error::Validation(format!("malformed actor '{s}'"))),
        }
    }
}

impl Serialize for Actor {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Actor {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}
