use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;
use crate::models::auth::Actor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransactionType {
    Credit,
    Debit,
    ManualAdjust,
    ReferralBonus,
    RedemptionDebit,
    Refund,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Credit => "credit",
            TransactionType::Debit => "debit",
            TransactionType::ManualAdjust => "manual-adjust",
            TransactionType::ReferralBonus => "referral-bonus",
            TransactionType::RedemptionDebit => "redemption-debit",
            TransactionType::Refund => "refund",
        }
    }

    /// Types that may only add points.
    pub fn is_credit(&self) -> bool {
        matches!(
            self,
            TransactionType::Credit | TransactionType::ReferralBonus | TransactionType::Refund
        )
    }

    /// Types that may only remove points.
    pub fn is_debit(&self) -> bool {
        matches!(self, TransactionType::Debit | TransactionType::RedemptionDebit)
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "credit" => Ok(TransactionType::Credit),
            "debit" => Ok(TransactionType::Debit),
            "manual-adjust" => Ok(TransactionType::ManualAdjust),
            "referral-bonus" => Ok(TransactionType::ReferralBonus),
            "redemption-debit" => Ok(TransactionType::RedemptionDebit),
            "refund" => Ok(TransactionType::Refund),
            other => Err(Error::Validation(format!("unknown transaction type '{other}'"))),
        }
    }
}

/// Immutable ledger row. `amount` is signed: credits are positive, debits negative.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub amount: i64,
    pub balance_after: i64,
    pub reason: String,
    pub actor: Actor,
    pub meta: serde_json::Value,
    pub redemption_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// How an entry moves the balance. The store turns it into a signed amount
/// against the balance it reads under the user's lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceChange {
    Credit(i64),
    Debit(i64),
    Delta(i64),
    SetTo(i64),
}

impl BalanceChange {
    /// Signed amount to append given the current balance.
    pub fn resolve(&self, current: i64) -> Result<i64, Error> {
        self.apply(current).map(|(amount, _)| amount)
    }

    /// Signed amount and the balance it leaves. Fails without side effects if
    /// the result would go negative or leave the `i64` range.
    pub fn apply(&self, current: i64) -> Result<(i64, i64), Error> {
        let out_of_range = || Error::Validation("balance change is out of range".into());
        let signed = match *self {
            BalanceChange::Credit(amount) | BalanceChange::Delta(amount) => amount,
            BalanceChange::Debit(amount) => amount.checked_neg().ok_or_else(out_of_range)?,
            BalanceChange::SetTo(target) => {
                target.checked_sub(current).ok_or_else(out_of_range)?
            }
        };
        let after = current.checked_add(signed).ok_or_else(out_of_range)?;
        if after < 0 {
            return Err(Error::InsufficientBalance {
                available: current,
                required: signed.saturating_neg(),
            });
        }
        Ok((signed, after))
    }
}

#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub user_id: Uuid,
    pub kind: TransactionType,
    pub change: BalanceChange,
    pub reason: String,
    pub actor: Actor,
    pub meta: serde_json::Value,
}

impl LedgerEntry {
    pub fn into_transaction(self, amount: i64, balance_after: i64) -> Transaction {
        Transaction {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            kind: self.kind,
            amount,
            balance_after,
            reason: self.reason,
            actor: self.actor,
            meta: self.meta,
            redemption_id: None,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionQuery {
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    100
}

impl Default for TransactionQuery {
    fn default() -> Self {
        Self {
            user_id: None,
            limit: default_limit(),
        }
    }
}

impl TransactionQuery {
    pub const MAX_LIMIT: u32 = 500;

    pub fn for_user(user_id: Uuid) -> Self {
        Self {
            user_id: Some(user_id),
            limit: Self::MAX_LIMIT,
        }
    }

    pub fn normalized(mut self) -> Self {
        self.limit = self.limit.clamp(1, Self::MAX_LIMIT);
        self
    }
}
