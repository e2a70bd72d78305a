use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::{mapref::entry::Entry, DashMap};
use parking_lot::RwLock;
use serde_json::json;
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
    referral::{ReferralCredit, ReferralGrant, ReferralStats},
    transaction::{BalanceChange, LedgerEntry, Transaction, TransactionQuery, TransactionType},
    user::{NewUser, Page, User, UserCredentials, UserQuery, UserStatus, UserUpdate},
};
use crate::repositories::LedgerRepository;

/// Everything owned by one user. Guarded by a single lock so a ledger append
/// and the record it belongs to become visible together.
struct Account {
    user: User,
    password_hash: String,
    transactions: Vec<Transaction>,
    requests: Vec<RedemptionRequest>,
    referral_credits: Vec<ReferralCredit>,
}

impl Account {
    fn append(
        &mut self,
        entry: LedgerEntry,
        redemption_id: Option<Uuid>,
    ) -> Result<Transaction, Error> {
        let current = self.user.points;
        let (amount, balance_after) = entry.change.apply(current)?;
        let mut tx = entry.into_transaction(amount, balance_after);
        tx.redemption_id = redemption_id;

        self.user.points = tx.balance_after;
        self.user.updated_at = tx.created_at;
        self.transactions.push(tx.clone());
        Ok(tx)
    }

    fn request_mut(&mut self, id: Uuid) -> Result<&mut RedemptionRequest, Error> {
        self.requests
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| Error::NotFound(format!("redemption request {id}")))
    }
}

/// In-process store: one lock per user account, no cross-user coordination.
pub struct MemoryLedgerRepository {
    accounts: DashMap<Uuid, Arc<RwLock<Account>>>,
    emails: DashMap<String, Uuid>,
    referral_codes: DashMap<String, Uuid>,
    request_owners: DashMap<Uuid, Uuid>,
    catalog: DashMap<Uuid, CatalogItem>,
    /// Shared by request creation, exclusive for catalog removal, so an item
    /// is never deleted between a request's check and its insert.
    catalog_guard: RwLock<()>,
    settings: RwLock<PricingSettings>,
    audit: RwLock<Vec<AuditEntry>>,
}

impl Default for MemoryLedgerRepository {
    fn default() -> Self {
        Self::new(PricingSettings::default())
    }
}

impl MemoryLedgerRepository {
    pub fn new(settings: PricingSettings) -> Self {
        Self {
            accounts: DashMap::new(),
            emails: DashMap::new(),
            referral_codes: DashMap::new(),
            request_owners: DashMap::new(),
            catalog: DashMap::new(),
            catalog_guard: RwLock::new(()),
            settings: RwLock::new(settings),
            audit: RwLock::new(Vec::new()),
        }
    }

    fn account(&self, id: Uuid) -> Option<Arc<RwLock<Account>>> {
        self.accounts.get(&id).map(|entry| entry.value().clone())
    }

    fn account_or_unknown(&self, id: Uuid) -> Result<Arc<RwLock<Account>>, Error> {
        self.account(id).ok_or(Error::UnknownUser(id))
    }

    fn request_account(&self, request_id: Uuid) -> Result<Arc<RwLock<Account>>, Error> {
        let owner = self
            .request_owners
            .get(&request_id)
            .map(|entry| *entry.value())
            .ok_or_else(|| Error::NotFound(format!("redemption request {request_id}")))?;
        self.account_or_unknown(owner)
    }

    fn all_accounts(&self) -> Vec<Arc<RwLock<Account>>> {
        self.accounts.iter().map(|entry| entry.value().clone()).collect()
    }
}

#[async_trait]
impl LedgerRepository for MemoryLedgerRepository {
    async fn health(&self) -> Result<(), Error> {
        Ok(())
    }

    async fn insert_user(&self, new: NewUser) -> Result<User, Error> {
        let email = new.email.to_lowercase();
        let id = Uuid::new_v4();

        let email_slot = match self.emails.entry(email.clone()) {
            Entry::Occupied(_) => return Err(Error::Conflict("email already registered".into())),
            Entry::Vacant(slot) => slot,
        };
        match self.referral_codes.entry(new.referral_code.clone()) {
            Entry::Occupied(_) => return Err(Error::Conflict("referral code already taken".into())),
            Entry::Vacant(slot) => {
                slot.insert(id);
            }
        }

        let now = Utc::now();
        let user = User {
            id,
            email,
            points: 0,
            role: new.role,
            status: UserStatus::Active,
            referral_code: new.referral_code,
            referred_by: new.referred_by,
            created_at: now,
            updated_at: now,
        };
        self.accounts.insert(
            id,
            Arc::new(RwLock::new(Account {
                user: user.clone(),
                password_hash: new.password_hash,
                transactions: Vec::new(),
                requests: Vec::new(),
                referral_credits: Vec::new(),
            })),
        );
        email_slot.insert(id);
        Ok(user)
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, Error> {
        Ok(self.account(id).map(|account| account.read().user.clone()))
    }

    async fn find_credentials(&self, email: &str) -> Result<Option<UserCredentials>, Error> {
        let Some(id) = self.emails.get(&email.to_lowercase()).map(|e| *e.value()) else {
            return Ok(None);
        };
        Ok(self.account(id).map(|account| {
            let account = account.read();
            UserCredentials {
                user: account.user.clone(),
                password_hash: account.password_hash.clone(),
            }
        }))
    }

    async fn find_by_referral_code(&self, code: &str) -> Result<Option<User>, Error> {
        let Some(id) = self.referral_codes.get(code).map(|e| *e.value()) else {
            return Ok(None);
        };
        self.get_user(id).await
    }

    async fn list_users(&self, query: &UserQuery) -> Result<Page<User>, Error> {
        let query = query.clone().normalized();
        let mut users: Vec<User> = self
            .all_accounts()
            .iter()
            .map(|account| account.read().user.clone())
            .filter(|user| match &query.q {
                Some(q) => user.email.contains(q.as_str()),
                None => true,
            })
            .collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = users.len() as u64;
        let items = users
            .into_iter()
            .skip(usize::try_from(query.offset()).unwrap_or(usize::MAX))
            .take(query.limit as usize)
            .collect();
        Ok(Page {
            items,
            page: query.page,
            limit: query.limit,
            total,
        })
    }

    async fn update_user(
        &self,
        id: Uuid,
        update: UserUpdate,
        audit: AuditEntry,
    ) -> Result<User, Error> {
        let account = self.account_or_unknown(id)?;
        let mut account = account.write();
        // the only step that can fail, so it runs first
        if let Some(entry) = update.balance {
            account.append(entry, None)?;
        }
        if let Some(role) = update.role {
            account.user.role = role;
        }
        if let Some(status) = update.status {
            account.user.status = status;
        }
        account.user.updated_at = Utc::now();
        self.audit.write().push(audit);
        Ok(account.user.clone())
    }

    async fn append_entry(&self, entry: LedgerEntry) -> Result<Transaction, Error> {
        let account = self.account_or_unknown(entry.user_id)?;
        let mut account = account.write();
        account.append(entry, None)
    }

    async fn balance_of(&self, user_id: Uuid) -> Result<i64, Error> {
        let account = self.account_or_unknown(user_id)?;
        let balance = account.read().user.points;
        Ok(balance)
    }

    async fn list_transactions(&self, query: &TransactionQuery) -> Result<Vec<Transaction>, Error> {
        let query = query.clone().normalized();
        let accounts = match query.user_id {
            Some(id) => vec![self.account_or_unknown(id)?],
            None => self.all_accounts(),
        };
        let mut transactions: Vec<Transaction> = accounts
            .iter()
            .flat_map(|account| {
                account.read().transactions.iter().rev().cloned().collect::<Vec<_>>()
            })
            .collect();
        // stable sort keeps newest-first order for equal timestamps
        transactions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        transactions.truncate(query.limit as usize);
        Ok(transactions)
    }

    async fn create_redemption(
        &self,
        new: NewRedemption,
    ) -> Result<(RedemptionRequest, Transaction), Error> {
        let _catalog = self.catalog_guard.read();
        let available = self
            .catalog
            .get(&new.catalog_item_id)
            .is_some_and(|item| item.enabled);
        if !available {
            return Err(Error::NotFound("reward is not available".into()));
        }

        let account = self.account_or_unknown(new.user_id)?;
        let mut account = account.write();
        if account.user.status == UserStatus::Banned {
            return Err(Error::BannedAccount);
        }

        let request = RedemptionRequest::pending(&new);
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
        let tx = account.append(entry, Some(request.id))?;
        account.requests.push(request.clone());
        self.request_owners.insert(request.id, new.user_id);
        Ok((request, tx))
    }

    async fn resolve_redemption(
        &self,
        id: Uuid,
        resolution: Resolution,
    ) -> Result<(RedemptionRequest, Option<Transaction>), Error> {
        let account = self.request_account(id)?;
        let mut account = account.write();

        let (user_id, price, next) = {
            let request = account.request_mut(id)?;
            let next = request.status.transition(resolution.status)?;
            (request.user_id, request.price_at_creation, next)
        };

        let refund = if next == RedemptionStatus::Rejected {
            let entry = LedgerEntry {
                user_id,
                kind: TransactionType::Refund,
                change: BalanceChange::Credit(price),
                reason: "refund: redemption rejected".into(),
                actor: Actor::Admin(resolution.actor_id),
                meta: json!({ "redemptionId": id }),
            };
            Some(account.append(entry, Some(id))?)
        } else {
            None
        };

        let request = account.request_mut(id)?;
        request.status = next;
        request.resolved_by = Some(resolution.actor_id);
        if let Some(note) = resolution.note {
            request.admin_note = Some(note);
        }
        request.updated_at = Utc::now();
        Ok((request.clone(), refund))
    }

    async fn annotate_redemption(&self, id: Uuid, note: String) -> Result<RedemptionRequest, Error> {
        let account = self.request_account(id)?;
        let mut account = account.write();
        let request = account.request_mut(id)?;
        request.admin_note = Some(note);
        request.updated_at = Utc::now();
        Ok(request.clone())
    }

    async fn get_redemption(&self, id: Uuid) -> Result<Option<RedemptionRequest>, Error> {
        let account = match self.request_account(id) {
            Ok(account) => account,
            Err(Error::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        let found = account.read().requests.iter().find(|r| r.id == id).cloned();
        Ok(found)
    }

    async fn list_redemptions(
        &self,
        query: &RedemptionQuery,
    ) -> Result<Vec<RedemptionRequest>, Error> {
        let accounts = match query.user_id {
            Some(id) => vec![self.account_or_unknown(id)?],
            None => self.all_accounts(),
        };
        let mut requests: Vec<RedemptionRequest> = accounts
            .iter()
            .flat_map(|account| {
                account
                    .read()
                    .requests
                    .iter()
                    .rev()
                    .filter(|r| query.status.matches(r.status))
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(requests)
    }

    async fn grant_referral_bonus(&self, grant: ReferralGrant) -> Result<Transaction, Error> {
        if !self.accounts.contains_key(&grant.referred_user_id) {
            return Err(Error::UnknownUser(grant.referred_user_id));
        }
        let account = self.account_or_unknown(grant.referrer_id)?;
        let mut account = account.write();
        if account
            .referral_credits
            .iter()
            .any(|c| c.referred_user_id == grant.referred_user_id)
        {
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
        let tx = account.append(entry, None)?;
        account.referral_credits.push(ReferralCredit {
            referrer_id: grant.referrer_id,
            referred_user_id: grant.referred_user_id,
            credited_transaction_id: tx.id,
            created_at: tx.created_at,
        });
        Ok(tx)
    }

    async fn referral_stats(&self, referrer_id: Uuid) -> Result<ReferralStats, Error> {
        let (code, referral_points) = {
            let account = self.account_or_unknown(referrer_id)?;
            let account = account.read();
            let points = account
                .transactions
                .iter()
                .filter(|t| t.kind == TransactionType::ReferralBonus)
                .map(|t| t.amount)
                .sum();
            (account.user.referral_code.clone(), points)
        };
        let referred_count = self
            .all_accounts()
            .iter()
            .filter(|account| account.read().user.referred_by == Some(referrer_id))
            .count() as u64;
        Ok(ReferralStats {
            referred_count,
            referral_points,
            my_referral_code: code,
        })
    }

    async fn list_referred_users(&self, referrer_id: Uuid, limit: u32) -> Result<Vec<User>, Error> {
        let mut users: Vec<User> = self
            .all_accounts()
            .iter()
            .map(|account| account.read().user.clone())
            .filter(|user| user.referred_by == Some(referrer_id))
            .collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        users.truncate(limit as usize);
        Ok(users)
    }

    async fn insert_catalog_item(&self, new: NewCatalogItem) -> Result<CatalogItem, Error> {
        let now = Utc::now();
        let item = CatalogItem {
            id: Uuid::new_v4(),
            method: new.method,
            label: new.label,
            qty: new.qty,
            price_points: new.price_points,
            enabled: new.enabled,
            created_at: now,
            updated_at: now,
        };
        self.catalog.insert(item.id, item.clone());
        Ok(item)
    }

    async fn get_catalog_item(&self, id: Uuid) -> Result<Option<CatalogItem>, Error> {
        Ok(self.catalog.get(&id).map(|e| e.value().clone()))
    }

    async fn list_catalog(&self, include_disabled: bool) -> Result<Vec<CatalogItem>, Error> {
        let mut items: Vec<CatalogItem> = self
            .catalog
            .iter()
            .map(|e| e.value().clone())
            .filter(|item| include_disabled || item.enabled)
            .collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(items)
    }

    async fn update_catalog_item(
        &self,
        id: Uuid,
        patch: CatalogItemPatch,
    ) -> Result<CatalogItem, Error> {
        let mut item = self
            .catalog
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("catalog item {id}")))?;
        patch.apply(&mut item);
        Ok(item.clone())
    }

    async fn remove_catalog_item(&self, id: Uuid) -> Result<CatalogRemoval, Error> {
        let _catalog = self.catalog_guard.write();
        if !self.catalog.contains_key(&id) {
            return Err(Error::NotFound(format!("catalog item {id}")));
        }
        let referenced = self
            .all_accounts()
            .iter()
            .any(|account| account.read().requests.iter().any(|r| r.catalog_item_id == id));

        if referenced {
            if let Some(mut item) = self.catalog.get_mut(&id) {
                item.enabled = false;
                item.updated_at = Utc::now();
            }
            Ok(CatalogRemoval { id, deleted: false, retired: true })
        } else {
            self.catalog.remove(&id);
            Ok(CatalogRemoval { id, deleted: true, retired: false })
        }
    }

    async fn pricing_settings(&self) -> Result<PricingSettings, Error> {
        Ok(self.settings.read().clone())
    }

    async fn update_pricing_settings(
        &self,
        patch: PricingSettingsPatch,
    ) -> Result<PricingSettings, Error> {
        let mut settings = self.settings.write();
        patch.apply(&mut settings);
        Ok(settings.clone())
    }

    async fn record_audit(&self, entry: AuditEntry) -> Result<(), Error> {
        self.audit.write().push(entry);
        Ok(())
    }

    async fn list_audit(&self, limit: u32) -> Result<Vec<AuditEntry>, Error> {
        let audit = self.audit.read();
        Ok(audit.iter().rev().take(limit as usize).cloned().collect())
    }
}
