use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::error::Error;
use crate::models::{
    auth::Actor,
    transaction::{BalanceChange, LedgerEntry, Transaction, TransactionQuery, TransactionType},
};
use crate::repositories::LedgerRepository;

fn require_positive(amount: i64) -> Result<(), Error> {
    if amount <= 0 {
        return Err(Error::Validation("amount must be greater than zero".into()));
    }
    Ok(())
}

async fn append(repo: &dyn LedgerRepository, entry: LedgerEntry) -> Result<Transaction, Error> {
    let tx = repo.append_entry(entry).await?;
    info!(
        user_id = %tx.user_id,
        kind = %tx.kind,
        amount = tx.amount,
        balance = tx.balance_after,
        actor = %tx.actor,
        "ledger entry appended"
    );
    Ok(tx)
}

/// Appends a positive-effect transaction of a credit-like type.
pub async fn credit(
    repo: &dyn LedgerRepository,
    user_id: Uuid,
    amount: i64,
    kind: TransactionType,
    reason: &str,
    actor: Actor,
    meta: Value,
) -> Result<Transaction, Error> {
    require_positive(amount)?;
    if !kind.is_credit() {
        return Err(Error::Validation(format!("{kind} cannot be used as a credit")));
    }
    append(
        repo,
        LedgerEntry {
            user_id,
            kind,
            change: BalanceChange::Credit(amount),
            reason: reason.to_string(),
            actor,
            meta,
        },
    )
    .await
}

/// Appends a negative-effect transaction only if the balance covers it.
pub async fn debit(
    repo: &dyn LedgerRepository,
    user_id: Uuid,
    amount: i64,
    kind: TransactionType,
    reason: &str,
    actor: Actor,
    meta: Value,
) -> Result<Transaction, Error> {
    require_positive(amount)?;
    if !kind.is_debit() {
        return Err(Error::Validation(format!("{kind} cannot be used as a debit")));
    }
    append(
        repo,
        LedgerEntry {
            user_id,
            kind,
            change: BalanceChange::Debit(amount),
            reason: reason.to_string(),
            actor,
            meta,
        },
    )
    .await
}

/// Entry that moves the balance to `new_balance` as one `manual-adjust`.
pub fn set_absolute_entry(
    user_id: Uuid,
    new_balance: i64,
    actor: Actor,
    reason: &str,
) -> Result<LedgerEntry, Error> {
    if new_balance < 0 {
        return Err(Error::Validation("balance cannot be negative".into()));
    }
    Ok(LedgerEntry {
        user_id,
        kind: TransactionType::ManualAdjust,
        change: BalanceChange::SetTo(new_balance),
        reason: reason.to_string(),
        actor,
        meta: serde_json::json!({ "setTo": new_balance }),
    })
}

/// Records one `manual-adjust` moving the balance to `new_balance`. A zero
/// delta is still recorded.
pub async fn set_absolute(
    repo: &dyn LedgerRepository,
    user_id: Uuid,
    new_balance: i64,
    actor: Actor,
    reason: &str,
) -> Result<Transaction, Error> {
    let entry = set_absolute_entry(user_id, new_balance, actor, reason)?;
    append(repo, entry).await
}

pub async fn zero(
    repo: &dyn LedgerRepository,
    user_id: Uuid,
    actor: Actor,
    reason: &str,
) -> Result<Transaction, Error> {
    set_absolute(repo, user_id, 0, actor, reason).await
}

/// Signed admin adjustment. Concurrent deltas accumulate; a delta that would
/// take the balance below zero is refused.
pub async fn apply_delta(
    repo: &dyn LedgerRepository,
    user_id: Uuid,
    delta: i64,
    actor: Actor,
    reason: &str,
) -> Result<Transaction, Error> {
    if delta == 0 {
        return Err(Error::Validation("delta must not be zero".into()));
    }
    if delta == i64::MIN {
        return Err(Error::Validation("delta is out of range".into()));
    }
    append(
        repo,
        LedgerEntry {
            user_id,
            kind: TransactionType::ManualAdjust,
            change: BalanceChange::Delta(delta),
            reason: reason.to_string(),
            actor,
            meta: serde_json::json!({ "delta": delta }),
        },
    )
    .await
}

pub async fn balance_of(repo: &dyn LedgerRepository, user_id: Uuid) -> Result<i64, Error> {
    repo.balance_of(user_id).await
}

pub async fn history(
    repo: &dyn LedgerRepository,
    query: TransactionQuery,
) -> Result<Vec<Transaction>, Error> {
    if let Some(user_id) = query.user_id {
        repo.get_user(user_id)
            .await?
            .ok_or(Error::UnknownUser(user_id))?;
    }
    repo.list_transactions(&query.normalized()).await
}
