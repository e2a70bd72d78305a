use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;
use crate::models::catalog::RewardMethod;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RedemptionStatus {
    Pending,
    Approved,
    Rejected,
}

impl RedemptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RedemptionStatus::Pending => "pending",
            RedemptionStatus::Approved => "approved",
            RedemptionStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RedemptionStatus::Pending)
    }

    /// The only legal moves are pending -> approved and pending -> rejected.
    pub fn transition(self, to: RedemptionStatus) -> Result<RedemptionStatus, Error> {
        match (self, to) {
            (RedemptionStatus::Pending, RedemptionStatus::Approved)
            | (RedemptionStatus::Pending, RedemptionStatus::Rejected) => Ok(to),
            (from, to) => Err(Error::InvalidStateTransition { from, to }),
        }
    }
}

impl fmt::Display for RedemptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RedemptionStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RedemptionStatus::Pending),
            "approved" => Ok(RedemptionStatus::Approved),
            "rejected" => Ok(RedemptionStatus::Rejected),
            other => Err(Error::Validation(format!("unknown request status '{other}'"))),
        }
    }
}

/// Where a reward is delivered, validated against the reward method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Wallet {
        wallet_number: String,
        wallet_name: String,
    },
    GameAccount {
        account_id: String,
        email: String,
    },
}

impl Destination {
    pub const WALLET_NUMBER_LEN: usize = 11;

    pub fn from_dto(method: RewardMethod, dto: &CreateRedemptionDto) -> Result<Self, Error> {
        let field = |v: &Option<String>| v.as_deref().map(str::trim).unwrap_or("").to_string();

        if method.is_wallet() {
            let wallet_number = field(&dto.wallet_number);
            let wallet_name = field(&dto.wallet_name);
            if wallet_number.len() != Self::WALLET_NUMBER_LEN
                || !wallet_number.chars().all(|c| c.is_ascii_digit())
            {
                return Err(Error::Validation(
                    "wallet number must be exactly 11 digits".into(),
                ));
            }
            if wallet_name.is_empty() {
                return Err(Error::Validation("wallet holder name is required".into()));
            }
            Ok(Destination::Wallet {
                wallet_number,
                wallet_name,
            })
        } else {
            let account_id = field(&dto.account_id);
            let email = field(&dto.email);
            if account_id.is_empty() {
                return Err(Error::Validation("game account id is required".into()));
            }
            if email.is_empty() {
                return Err(Error::Validation("account email is required".into()));
            }
            Ok(Destination::GameAccount { account_id, email })
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub method: RewardMethod,
    pub catalog_item_id: Uuid,
    pub label: String,
    pub qty: i64,
    /// Points debited at creation; never recomputed.
    pub price_at_creation: i64,
    pub status: RedemptionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub admin_note: Option<String>,
    pub resolved_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RedemptionRequest {
    pub fn pending(new: &NewRedemption) -> Self {
        let now = Utc::now();
        let (wallet_number, wallet_name, account_id, email) = match &new.destination {
            Destination::Wallet {
                wallet_number,
                wallet_name,
            } => (Some(wallet_number.clone()), Some(wallet_name.clone()), None, None),
            Destination::GameAccount { account_id, email } => {
                (None, None, Some(account_id.clone()), Some(email.clone()))
            }
        };
        Self {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            method: new.method,
            catalog_item_id: new.catalog_item_id,
            label: new.label.clone(),
            qty: new.qty,
            price_at_creation: new.price,
            status: RedemptionStatus::Pending,
            wallet_number,
            wallet_name,
            account_id,
            email,
            admin_note: None,
            resolved_by: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRedemptionDto {
    pub catalog_item_id: Uuid,
    #[serde(default)]
    pub method: Option<RewardMethod>,
    #[serde(default)]
    pub wallet_number: Option<String>,
    #[serde(default)]
    pub wallet_name: Option<String>,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Fully validated request handed to the store with its price already resolved.
#[derive(Debug, Clone)]
pub struct NewRedemption {
    pub user_id: Uuid,
    pub catalog_item_id: Uuid,
    pub method: RewardMethod,
    pub label: String,
    pub qty: i64,
    pub price: i64,
    pub destination: Destination,
}

#[derive(Debug, Clone)]
pub struct Resolution {
    pub status: RedemptionStatus,
    pub actor_id: Uuid,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionPatch {
    pub status: Option<RedemptionStatus>,
    pub admin_note: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Pending,
    Approved,
    Rejected,
}

impl StatusFilter {
    pub fn matches(&self, status: RedemptionStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Pending => status == RedemptionStatus::Pending,
            StatusFilter::Approved => status == RedemptionStatus::Approved,
            StatusFilter::Rejected => status == RedemptionStatus::Rejected,
        }
    }

    pub fn status(&self) -> Option<RedemptionStatus> {
        match self {
            StatusFilter::All => None,
            StatusFilter::Pending => Some(RedemptionStatus::Pending),
            StatusFilter::Approved => Some(RedemptionStatus::Approved),
            StatusFilter::Rejected => Some(RedemptionStatus::Rejected),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionQuery {
    #[serde(default)]
    pub status: StatusFilter,
    #[serde(default)]
    pub user_id: Option<Uuid>,
}
