use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use sqlx::{
    postgres::{PgPoolOptions, PgRow},
    PgConnection, PgPool, Row,
};
use uuid::Uuid;

use crate::error::Error;
use crate::models::{
    audit::AuditEntry,
    auth::Actor,
    catalog::{
        CatalogItem, CatalogItemPatch, CatalogRemoval, NewCatalogItem, PricingSettings,
        PricingSettingsPatch,
    },
    redemption::{NewRedemption, RedemptionQuery, RedemptionRequest, RedemptionStatus, Resolution},
    referral::{ReferralGrant, ReferralStats},
    transaction::{BalanceChange, LedgerEntry, Transaction, TransactionQuery, TransactionType},
    user::{NewUser, Page, User, UserCredentials, UserQuery, UserStatus, UserUpdate},
};
use crate::repositories::LedgerRepository;

const USER_COLUMNS: &str =
    "id, email, points, role, status, referral_code, referred_by, created_at, updated_at";
const TRANSACTION_COLUMNS: &str =
    "id, user_id, type, amount, balance_after, reason, actor, meta, redemption_id, created_at";
const REQUEST_COLUMNS: &str = "id, user_id, catalog_item_id, method, label, qty, price_at_creation, \
     status, wallet_number, wallet_name, account_id, account_email, admin_note, resolved_by, \
     created_at, updated_at";
const CATALOG_COLUMNS: &str =
    "id, method, label, qty, price_points, enabled, created_at, updated_at";

fn user_from_row(row: &PgRow) -> Result<User, Error> {
    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        points: row.try_get("points")?,
        role: row.try_get::<String, _>("role")?.parse()?,
        status: row.try_get::<String, _>("status")?.parse()?,
        referral_code: row.try_get("referral_code")?,
        referred_by: row.try_get("referred_by")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn transaction_from_row(row: &PgRow) -> Result<Transaction, Error> {
    Ok(Transaction {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        kind: row.try_get::<String, _>("type")?.parse()?,
        amount: row.try_get("amount")?,
        balance_after: row.try_get("balance_after")?,
        reason: row.try_get("reason")?,
        actor: row.try_get::<String, _>("actor")?.parse()?,
        meta: row.try_get("meta")?,
        redemption_id: row.try_get("redemption_id")?,
        created_at: row.try_get("created_at")?,
    })
}

fn request_from_row(row: &PgRow) -> Result<RedemptionRequest, Error> {
    Ok(RedemptionRequest {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        method: row.try_get::<String, _>("method")?.parse()?,
        catalog_item_id: row.try_get("catalog_item_id")?,
        label: row.try_get("label")?,
        qty: row.try_get("qty")?,
        price_at_creation: row.try_get("price_at_creation")?,
        status: row.try_get::<String, _>("status")?.parse()?,
        wallet_number: row.try_get("wallet_number")?,
        wallet_name: row.try_get("wallet_name")?,
        account_id: row.try_get("account_id")?,
        email: row.try_get("account_email")?,
        admin_note: row.try_get("admin_note")?,
        resolved_by: row.try_get("resolved_by")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn catalog_from_row(row: &PgRow) -> Result<CatalogItem, Error> {
    Ok(CatalogItem {
        id: row.try_get("id")?,
        method: row.try_get::<String, _>("method")?.parse()?,
        label: row.try_get("label")?,
        qty: row.try_get("qty")?,
        price_points: row.try_get("price_points")?,
        enabled: row.try_get("enabled")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn audit_from_row(row: &PgRow) -> Result<AuditEntry, Error> {
    Ok(AuditEntry {
        id: row.try_get("id")?,
        actor_id: row.try_get("actor_id")?,
        target_user_id: row.try_get("target_user_id")?,
        action: row.try_get("action")?,
        reason: row.try_get("reason")?,
        detail: row.try_get("detail")?,
        created_at: row.try_get("created_at")?,
    })
}

fn settings_from_row(row: &PgRow) -> Result<PricingSettings, Error> {
    Ok(PricingSettings {
        freefire_per100_points: row.try_get("freefire_per100_points")?,
        pubg_per60_points: row.try_get("pubg_per60_points")?,
        vodafone_points_per_egp: row.try_get("vodafone_points_per_egp")?,
    })
}

/// `LIKE` pattern matching `needle` anywhere, with its wildcards taken literally.
fn contains_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Locks the user row for the rest of the transaction and returns its status
/// together with the balance recomputed from the ledger.
async fn lock_user(conn: &mut PgConnection, user_id: Uuid) -> Result<(UserStatus, i64), Error> {
    let row = sqlx::query("SELECT status FROM users WHERE id = $1 FOR UPDATE")
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(Error::UnknownUser(user_id))?;
    let status: UserStatus = row.try_get::<String, _>("status")?.parse()?;

    let balance: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(amount), 0)::BIGINT FROM transactions WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok((status, balance))
}

/// Appends under a lock taken by `lock_user` and refreshes the cached points.
async fn append_locked(
    conn: &mut PgConnection,
    entry: LedgerEntry,
    balance: i64,
    redemption_id: Option<Uuid>,
) -> Result<Transaction, Error> {
    let (amount, balance_after) = entry.change.apply(balance)?;
    let mut tx = entry.into_transaction(amount, balance_after);
    tx.redemption_id = redemption_id;

    sqlx::query(
        r#"
        INSERT INTO transactions
            (id, user_id, type, amount, balance_after, reason, actor, meta, redemption_id, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(tx.id)
    .bind(tx.user_id)
    .bind(tx.kind.as_str())
    .bind(tx.amount)
    .bind(tx.balance_after)
    .bind(&tx.reason)
    .bind(tx.actor.to_string())
    .bind(&tx.meta)
    .bind(tx.redemption_id)
    .bind(tx.created_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| {
        Error::from_unique_violation(e, Error::Conflict("ledger entry already recorded".into()))
    })?;

    sqlx::query("UPDATE users SET points = $1, updated_at = $2 WHERE id = $3")
        .bind(tx.balance_after)
        .bind(tx.created_at)
        .bind(tx.user_id)
        .execute(&mut *conn)
        .await?;

    Ok(tx)
}

#[derive(Clone)]
pub struct PostgresLedgerRepository {
    pool: PgPool,
}

impl PostgresLedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<(), Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl LedgerRepository for PostgresLedgerRepository {
    async fn health(&self) -> Result<(), Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn insert_user(&self, new: NewUser) -> Result<User, Error> {
        let now = Utc::now();
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO users
                (id, email, password_hash, role, status, points, referral_code, referred_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, 'active', 0, $5, $6, $7, $7)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(new.email.to_lowercase())
        .bind(&new.password_hash)
        .bind(new.role.as_str())
        .bind(&new.referral_code)
        .bind(new.referred_by)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            Error::from_unique_violation(
                e,
                Error::Conflict("email or referral code already registered".into()),
            )
        })?;
        user_from_row(&row)
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, Error> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_credentials(&self, email: &str) -> Result<Option<UserCredentials>, Error> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = $1"
        ))
        .bind(email.to_lowercase())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(UserCredentials {
                user: user_from_row(&row)?,
                password_hash: row.try_get("password_hash")?,
            })),
            None => Ok(None),
        }
    }

    async fn find_by_referral_code(&self, code: &str) -> Result<Option<User>, Error> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE referral_code = $1"
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn list_users(&self, query: &UserQuery) -> Result<Page<User>, Error> {
        let query = query.clone().normalized();
        let pattern = query.q.as_deref().map(contains_pattern);
        let rows = sqlx::query(&format!(
            r#"
            SELECT {USER_COLUMNS} FROM users
            WHERE ($1::TEXT IS NULL OR email LIKE $1 ESCAPE '\')
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(&pattern)
        .bind(query.limit as i64)
        .bind(i64::try_from(query.offset()).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r"SELECT COUNT(*) FROM users WHERE ($1::TEXT IS NULL OR email LIKE $1 ESCAPE '\')",
        )
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await?;

        Ok(Page {
            items: rows.iter().map(user_from_row).collect::<Result<_, _>>()?,
            page: query.page,
            limit: query.limit,
            total: total as u64,
        })
    }

    async fn update_user(
        &self,
        id: Uuid,
        update: UserUpdate,
        audit: AuditEntry,
    ) -> Result<User, Error> {
        let mut db = self.pool.begin().await?;
        let (_, balance) = lock_user(&mut db, id).await?;
        if let Some(entry) = update.balance {
            append_locked(&mut db, entry, balance, None).await?;
        }
        let row = sqlx::query(&format!(
            r#"
            UPDATE users
            SET role = COALESCE($1, role),
                status = COALESCE($2, status),
                updated_at = now()
            WHERE id = $3
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(update.role.map(|r| r.as_str()))
        .bind(update.status.map(|s| s.as_str()))
        .bind(id)
        .fetch_optional(&mut *db)
        .await?
        .ok_or(Error::UnknownUser(id))?;
        let user = user_from_row(&row)?;

        insert_audit(&mut db, &audit).await?;
        db.commit().await?;
        Ok(user)
    }

    async fn append_entry(&self, entry: LedgerEntry) -> Result<Transaction, Error> {
        let mut db = self.pool.begin().await?;
        let (_, balance) = lock_user(&mut db, entry.user_id).await?;
        let tx = append_locked(&mut db, entry, balance, None).await?;
        db.commit().await?;
        Ok(tx)
    }

    async fn balance_of(&self, user_id: Uuid) -> Result<i64, Error> {
        let row = sqlx::query(
            r#"
            SELECT u.id, COALESCE(SUM(t.amount), 0)::BIGINT AS balance
            FROM users u
            LEFT JOIN transactions t ON t.user_id = u.id
            WHERE u.id = $1
            GROUP BY u.id
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(Error::UnknownUser(user_id))?;
        Ok(row.try_get("balance")?)
    }

    async fn list_transactions(&self, query: &TransactionQuery) -> Result<Vec<Transaction>, Error> {
        let query = query.clone().normalized();
        let rows = sqlx::query(&format!(
            r#"
            SELECT {TRANSACTION_COLUMNS} FROM transactions
            WHERE ($1::UUID IS NULL OR user_id = $1)
            ORDER BY created_at DESC
            LIMIT $2
            "#
        ))
        .bind(query.user_id)
        .bind(query.limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(transaction_from_row).collect()
    }

    async fn create_redemption(
        &self,
        new: NewRedemption,
    ) -> Result<(RedemptionRequest, Transaction), Error> {
        let mut db = self.pool.begin().await?;
        let (status, balance) = lock_user(&mut db, new.user_id).await?;
        if status == UserStatus::Banned {
            return Err(Error::BannedAccount);
        }
        // held until commit; conflicts with the FOR UPDATE in remove_catalog_item
        let enabled: Option<bool> =
            sqlx::query_scalar("SELECT enabled FROM catalog_items WHERE id = $1 FOR SHARE")
                .bind(new.catalog_item_id)
                .fetch_optional(&mut *db)
                .await?;
        if enabled != Some(true) {
            return Err(Error::NotFound("reward is not available".into()));
        }
        // fail before writing anything
        BalanceChange::Debit(new.price).resolve(balance)?;

        let request = RedemptionRequest::pending(&new);
        sqlx::query(
            r#"
            INSERT INTO redemption_requests
                (id, user_id, catalog_item_id, method, label, qty, price_at_creation, status,
                 wallet_number, wallet_name, account_id, account_email, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $13)
            "#,
        )
        .bind(request.id)
        .bind(request.user_id)
        .bind(request.catalog_item_id)
        .bind(request.method.as_str())
        .bind(&request.label)
        .bind(request.qty)
        .bind(request.price_at_creation)
        .bind(request.status.as_str())
        .bind(&request.wallet_number)
        .bind(&request.wallet_name)
        .bind(&request.account_id)
        .bind(&request.email)
        .bind(request.created_at)
        .execute(&mut *db)
        .await
        .map_err(|e| {
            Error::from_foreign_key_violation(e, Error::NotFound("reward is not available".into()))
        })?;

        let entry = LedgerEntry {
            user_id: new.user_id,
            kind: TransactionType::RedemptionDebit,
            change: BalanceChange::Debit(new.price),
            reason: format!("redemption: {}", new.label),
            actor: Actor::User(new.user_id),
            meta: json!({
                "redemptionId": request.id,
                "catalogItemId": new.catalog_item_id,
                "method": new.method,
                "qty": new.qty,
            }),
        };
        let tx = append_locked(&mut db, entry, balance, Some(request.id)).await?;
        db.commit().await?;
        Ok((request, tx))
    }

    async fn resolve_redemption(
        &self,
        id: Uuid,
        resolution: Resolution,
    ) -> Result<(RedemptionRequest, Option<Transaction>), Error> {
        let mut db = self.pool.begin().await?;
        let row = sqlx::query(&format!(
            "SELECT {REQUEST_COLUMNS} FROM redemption_requests WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *db)
        .await?
        .ok_or_else(|| Error::NotFound(format!("redemption request {id}")))?;
        let mut request = request_from_row(&row)?;
        let next = request.status.transition(resolution.status)?;

        let refund = if next == RedemptionStatus::Rejected {
            let (_, balance) = lock_user(&mut db, request.user_id).await?;
            let entry = LedgerEntry {
                user_id: request.user_id,
                kind: TransactionType::Refund,
                change: BalanceChange::Credit(request.price_at_creation),
                reason: "refund: redemption rejected".into(),
                actor: Actor::Admin(resolution.actor_id),
                meta: json!({ "redemptionId": id }),
            };
            Some(append_locked(&mut db, entry, balance, Some(id)).await?)
        } else {
            None
        };

        request.status = next;
        request.resolved_by = Some(resolution.actor_id);
        if let Some(note) = resolution.note {
            request.admin_note = Some(note);
        }
        request.updated_at = Utc::now();

        sqlx::query(
            r#"
            UPDATE redemption_requests
            SET status = $1, resolved_by = $2, admin_note = $3, updated_at = $4
            WHERE id = $5
            "#,
        )
        .bind(request.status.as_str())
        .bind(request.resolved_by)
        .bind(&request.admin_note)
        .bind(request.updated_at)
        .bind(id)
        .execute(&mut *db)
        .await?;

        db.commit().await?;
        Ok((request, refund))
    }

    async fn annotate_redemption(&self, id: Uuid, note: String) -> Result<RedemptionRequest, Error> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE redemption_requests SET admin_note = $1, updated_at = now()
            WHERE id = $2
            RETURNING {REQUEST_COLUMNS}
            "#
        ))
        .bind(note)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("redemption request {id}")))?;
        request_from_row(&row)
    }

    async fn get_redemption(&self, id: Uuid) -> Result<Option<RedemptionRequest>, Error> {
        let row = sqlx::query(&format!(
            "SELECT {REQUEST_COLUMNS} FROM redemption_requests WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(request_from_row).transpose()
    }

    async fn list_redemptions(
        &self,
        query: &RedemptionQuery,
    ) -> Result<Vec<RedemptionRequest>, Error> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {REQUEST_COLUMNS} FROM redemption_requests
            WHERE ($1::TEXT IS NULL OR status = $1)
              AND ($2::UUID IS NULL OR user_id = $2)
            ORDER BY created_at DESC
            "#
        ))
        .bind(query.status.status().map(|s| s.as_str()))
        .bind(query.user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(request_from_row).collect()
    }

    async fn grant_referral_bonus(&self, grant: ReferralGrant) -> Result<Transaction, Error> {
        let mut db = self.pool.begin().await?;
        let (_, balance) = lock_user(&mut db, grant.referrer_id).await?;

        let referred_exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
                .bind(grant.referred_user_id)
                .fetch_one(&mut *db)
                .await?;
        if !referred_exists {
            return Err(Error::UnknownUser(grant.referred_user_id));
        }

        let already: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM referral_credits WHERE referrer_id = $1 AND referred_user_id = $2
            )
            "#,
        )
        .bind(grant.referrer_id)
        .bind(grant.referred_user_id)
        .fetch_one(&mut *db)
        .await?;
        if already {
            return Err(Error::DuplicateReferralCredit);
        }

        let entry = LedgerEntry {
            user_id: grant.referrer_id,
            kind: TransactionType::ReferralBonus,
            change: BalanceChange::Credit(grant.amount),
            reason: "referral bonus".into(),
            actor: grant.actor,
            meta: json!({ "referredUserId": grant.referred_user_id }),
        };
        let tx = append_locked(&mut db, entry, balance, None).await?;

        sqlx::query(
            r#"
            INSERT INTO referral_credits (referrer_id, referred_user_id, transaction_id, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(grant.referrer_id)
        .bind(grant.referred_user_id)
        .bind(tx.id)
        .bind(tx.created_at)
        .execute(&mut *db)
        .await
        .map_err(|e| Error::from_unique_violation(e, Error::DuplicateReferralCredit))?;

        db.commit().await?;
        Ok(tx)
    }

    async fn referral_stats(&self, referrer_id: Uuid) -> Result<ReferralStats, Error> {
        let user = self
            .get_user(referrer_id)
            .await?
            .ok_or(Error::UnknownUser(referrer_id))?;

        let referred_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE referred_by = $1")
                .bind(referrer_id)
                .fetch_one(&self.pool)
                .await?;
        let referral_points: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(amount), 0)::BIGINT FROM transactions
            WHERE user_id = $1 AND type = $2
            "#,
        )
        .bind(referrer_id)
        .bind(TransactionType::ReferralBonus.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(ReferralStats {
            referred_count: referred_count as u64,
            referral_points,
            my_referral_code: user.referral_code,
        })
    }

    async fn list_referred_users(&self, referrer_id: Uuid, limit: u32) -> Result<Vec<User>, Error> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {USER_COLUMNS} FROM users
            WHERE referred_by = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#
        ))
        .bind(referrer_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(user_from_row).collect()
    }

    async fn insert_catalog_item(&self, new: NewCatalogItem) -> Result<CatalogItem, Error> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO catalog_items (id, method, label, qty, price_points, enabled, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, now(), now())
            RETURNING {CATALOG_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(new.method.as_str())
        .bind(&new.label)
        .bind(new.qty)
        .bind(new.price_points)
        .bind(new.enabled)
        .fetch_one(&self.pool)
        .await?;
        catalog_from_row(&row)
    }

    async fn get_catalog_item(&self, id: Uuid) -> Result<Option<CatalogItem>, Error> {
        let row = sqlx::query(&format!(
            "SELECT {CATALOG_COLUMNS} FROM catalog_items WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(catalog_from_row).transpose()
    }

    async fn list_catalog(&self, include_disabled: bool) -> Result<Vec<CatalogItem>, Error> {
        let rows = sqlx::query(&format!(
            "SELECT {CATALOG_COLUMNS} FROM catalog_items WHERE $1 OR enabled ORDER BY created_at"
        ))
        .bind(include_disabled)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(catalog_from_row).collect()
    }

    async fn update_catalog_item(
        &self,
        id: Uuid,
        patch: CatalogItemPatch,
    ) -> Result<CatalogItem, Error> {
        let mut db = self.pool.begin().await?;
        let row = sqlx::query(&format!(
            "SELECT {CATALOG_COLUMNS} FROM catalog_items WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *db)
        .await?
        .ok_or_else(|| Error::NotFound(format!("catalog item {id}")))?;
        let mut item = catalog_from_row(&row)?;
        patch.apply(&mut item);

        sqlx::query(
            r#"
            UPDATE catalog_items
            SET method = $1, label = $2, qty = $3, price_points = $4, enabled = $5, updated_at = $6
            WHERE id = $7
            "#,
        )
        .bind(item.method.as_str())
        .bind(&item.label)
        .bind(item.qty)
        .bind(item.price_points)
        .bind(item.enabled)
        .bind(item.updated_at)
        .bind(id)
        .execute(&mut *db)
        .await?;

        db.commit().await?;
        Ok(item)
    }

    async fn remove_catalog_item(&self, id: Uuid) -> Result<CatalogRemoval, Error> {
        let mut db = self.pool.begin().await?;
        sqlx::query("SELECT id FROM catalog_items WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *db)
            .await?
            .ok_or_else(|| Error::NotFound(format!("catalog item {id}")))?;

        let referenced: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM redemption_requests WHERE catalog_item_id = $1)",
        )
        .bind(id)
        .fetch_one(&mut *db)
        .await?;

        let removal = if referenced {
            sqlx::query("UPDATE catalog_items SET enabled = FALSE, updated_at = now() WHERE id = $1")
                .bind(id)
                .execute(&mut *db)
                .await?;
            CatalogRemoval { id, deleted: false, retired: true }
        } else {
            sqlx::query("DELETE FROM catalog_items WHERE id = $1")
                .bind(id)
                .execute(&mut *db)
                .await?;
            CatalogRemoval { id, deleted: true, retired: false }
        };

        db.commit().await?;
        Ok(removal)
    }

    async fn pricing_settings(&self) -> Result<PricingSettings, Error> {
        let row = sqlx::query(
            r#"
            SELECT freefire_per100_points, pubg_per60_points, vodafone_points_per_egp
            FROM pricing_settings WHERE id = 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => settings_from_row(&row),
            None => Ok(PricingSettings::default()),
        }
    }

    async fn update_pricing_settings(
        &self,
        patch: PricingSettingsPatch,
    ) -> Result<PricingSettings, Error> {
        let mut settings = self.pricing_settings().await?;
        patch.apply(&mut settings);
        sqlx::query(
            r#"
            INSERT INTO pricing_settings
                (id, freefire_per100_points, pubg_per60_points, vodafone_points_per_egp, updated_at)
            VALUES (1, $1, $2, $3, now())
            ON CONFLICT (id) DO UPDATE SET
                freefire_per100_points = COALESCE($4, pricing_settings.freefire_per100_points),
                pubg_per60_points = COALESCE($5, pricing_settings.pubg_per60_points),
                vodafone_points_per_egp = COALESCE($6, pricing_settings.vodafone_points_per_egp),
                updated_at = now()
            "#,
        )
        .bind(settings.freefire_per100_points)
        .bind(settings.pubg_per60_points)
        .bind(settings.vodafone_points_per_egp)
        .bind(patch.freefire_per100_points)
        .bind(patch.pubg_per60_points)
        .bind(patch.vodafone_points_per_egp)
        .execute(&self.pool)
        .await?;
        self.pricing_settings().await
    }

    async fn record_audit(&self, entry: AuditEntry) -> Result<(), Error> {
        let mut conn = self.pool.acquire().await?;
        insert_audit(&mut conn, &entry).await
    }

    async fn list_audit(&self, limit: u32) -> Result<Vec<AuditEntry>, Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, actor_id, target_user_id, action, reason, detail, created_at
            FROM audit_log
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(audit_from_row).collect()
    }
}

async fn insert_audit(conn: &mut PgConnection, entry: &AuditEntry) -> Result<(), Error> {
    sqlx::query(
        r#"
        INSERT INTO audit_log (id, actor_id, target_user_id, action, reason, detail, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(entry.id)
    .bind(entry.actor_id)
    .bind(entry.target_user_id)
    .bind(&entry.action)
    .bind(&entry.reason)
    .bind(&entry.detail)
    .bind(entry.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
