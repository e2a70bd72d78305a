use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Error;
use crate::models::{
    audit::AuditEntry,
    catalog::{
        CatalogItem, CatalogItemPatch, CatalogRemoval, NewCatalogItem, PricingSettings,
        PricingSettingsPatch,
    },
    redemption::{NewRedemption, RedemptionQuery, RedemptionRequest, Resolution},
    referral::{ReferralGrant, ReferralStats},
    transaction::{LedgerEntry, Transaction, TransactionQuery},
    user::{NewUser, Page, User, UserCredentials, UserQuery, UserUpdate},
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryLedgerRepository;
pub use postgres::PostgresLedgerRepository;

/// Persistence for the points ledger.
///
/// Every mutating method is one atomic unit: implementations serialize it
/// against all other mutations of the same user, and a failed call leaves
/// the store exactly as it was. Reads never observe a partially applied unit.
#[async_trait]
pub trait LedgerRepository: Send + Sync {
    async fn health(&self) -> Result<(), Error>;

    // users
    /// Fails with `Conflict` on a duplicate email or referral code.
    async fn insert_user(&self, user: NewUser) -> Result<User, Error>;
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, Error>;
    async fn find_credentials(&self, email: &str) -> Result<Option<UserCredentials>, Error>;
    async fn find_by_referral_code(&self, code: &str) -> Result<Option<User>, Error>;
    async fn list_users(&self, query: &UserQuery) -> Result<Page<User>, Error>;
    /// Applies a role/status change and records its audit entry in the same unit.
    async fn update_user(&self, id: Uuid, update: UserUpdate, audit: AuditEntry)
        -> Result<User, Error>;

    // ledger
    /// Appends one transaction after checking the balance it produces is
    /// non-negative. Fails with `UnknownUser` or `InsufficientBalance`.
    async fn append_entry(&self, entry: LedgerEntry) -> Result<Transaction, Error>;
    async fn balance_of(&self, user_id: Uuid) -> Result<i64, Error>;
    async fn list_transactions(&self, query: &TransactionQuery) -> Result<Vec<Transaction>, Error>;

    // redemption
    /// Debits the price and inserts the pending request together. Re-checks
    /// user status and balance under the user's lock.
    async fn create_redemption(
        &self,
        request: NewRedemption,
    ) -> Result<(RedemptionRequest, Transaction), Error>;
    /// Moves a pending request to a terminal state; a rejection appends the
    /// refund in the same unit.
    async fn resolve_redemption(
        &self,
        id: Uuid,
        resolution: Resolution,
    ) -> Result<(RedemptionRequest, Option<Transaction>), Error>;
    async fn annotate_redemption(&self, id: Uuid, note: String) -> Result<RedemptionRequest, Error>;
    async fn get_redemption(&self, id: Uuid) -> Result<Option<RedemptionRequest>, Error>;
    async fn list_redemptions(&self, query: &RedemptionQuery)
        -> Result<Vec<RedemptionRequest>, Error>;

    // referral
    /// Fails with `DuplicateReferralCredit` if the pair was already credited.
    async fn grant_referral_bonus(&self, grant: ReferralGrant) -> Result<Transaction, Error>;
    async fn referral_stats(&self, referrer_id: Uuid) -> Result<ReferralStats, Error>;
    async fn list_referred_users(&self, referrer_id: Uuid, limit: u32) -> Result<Vec<User>, Error>;

    // catalog
    async fn insert_catalog_item(&self, item: NewCatalogItem) -> Result<CatalogItem, Error>;
    async fn get_catalog_item(&self, id: Uuid) -> Result<Option<CatalogItem>, Error>;
    async fn list_catalog(&self, include_disabled: bool) -> Result<Vec<CatalogItem>, Error>;
    async fn update_catalog_item(&self, id: Uuid, patch: CatalogItemPatch)
        -> Result<CatalogItem, Error>;
    /// Deletes an unreferenced item, disables a referenced one.
    async fn remove_catalog_item(&self, id: Uuid) -> Result<CatalogRemoval, Error>;

    // settings
    async fn pricing_settings(&self) -> Result<PricingSettings, Error>;
    async fn update_pricing_settings(&self, patch: PricingSettingsPatch)
        -> Result<PricingSettings, Error>;

    // audit
    async fn record_audit(&self, entry: AuditEntry) -> Result<(), Error>;
    async fn list_audit(&self, limit: u32) -> Result<Vec<AuditEntry>, Error>;
}
