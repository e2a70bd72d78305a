use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardMethod {
    Freefire,
    Pubg,
    VodafoneCash,
}

impl RewardMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RewardMethod::Freefire => "freefire",
            RewardMethod::Pubg => "pubg",
            RewardMethod::VodafoneCash => "vodafone_cash",
        }
    }

    /// Cash transfers go to a wallet; everything else is a game account top-up.
    pub fn is_wallet(&self) -> bool {
        matches!(self, RewardMethod::VodafoneCash)
    }
}

impl fmt::Display for RewardMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RewardMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "freefire" => Ok(RewardMethod::Freefire),
            "pubg" => Ok(RewardMethod::Pubg),
            "vodafone_cash" => Ok(RewardMethod::VodafoneCash),
            other => Err(Error::Validation(format!("unknown reward method '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    pub id: Uuid,
    pub method: RewardMethod,
    pub label: String,
    pub qty: i64,
    /// `0` means the price comes from the pricing formula.
    pub price_points: i64,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCatalogItem {
    pub method: RewardMethod,
    pub label: String,
    pub qty: i64,
    #[serde(default)]
    pub price_points: i64,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItemPatch {
    pub method: Option<RewardMethod>,
    pub label: Option<String>,
    pub qty: Option<i64>,
    pub price_points: Option<i64>,
    pub enabled: Option<bool>,
}

impl CatalogItemPatch {
    pub fn apply(&self, item: &mut CatalogItem) {
        if let Some(method) = self.method {
            item.method = method;
        }
        if let Some(label) = &self.label {
            item.label = label.trim().to_string();
        }
        if let Some(qty) = self.qty {
            item.qty = qty;
        }
        if let Some(price) = self.price_points {
            item.price_points = price;
        }
        if let Some(enabled) = self.enabled {
            item.enabled = enabled;
        }
        item.updated_at = Utc::now();
    }
}

/// Outcome of an admin delete: referenced items are only disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogRemoval {
    pub id: Uuid,
    pub deleted: bool,
    pub retired: bool,
}

/// Conversion rates used when a catalog item carries no explicit price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingSettings {
    pub freefire_per100_points: f64,
    pub pubg_per60_points: f64,
    pub vodafone_points_per_egp: f64,
}

impl Default for PricingSettings {
    fn default() -> Self {
        Self {
            freefire_per100_points: 105.0,
            pubg_per60_points: 105.0,
            vodafone_points_per_egp: 2.0,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PricingSettingsPatch {
    pub freefire_per100_points: Option<f64>,
    pub pubg_per60_points: Option<f64>,
    pub vodafone_points_per_egp: Option<f64>,
}

impl PricingSettingsPatch {
    pub fn validate(&self) -> Result<(), Error> {
        for (name, value) in [
            ("freefire_per100_points", self.freefire_per100_points),
            ("pubg_per60_points", self.pubg_per60_points),
            ("vodafone_points_per_egp", self.vodafone_points_per_egp),
        ] {
            if let Some(v) = value {
                if !v.is_finite() || v < 0.0 {
                    return Err(Error::Validation(format!(
                        "{name} must be a non-negative number"
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn apply(&self, settings: &mut PricingSettings) {
        if let Some(v) = self.freefire_per100_points {
            settings.freefire_per100_points = v;
        }
        if let Some(v) = self.pubg_per60_points {
            settings.pubg_per60_points = v;
        }
        if let Some(v) = self.vodafone_points_per_egp {
            settings.vodafone_points_per_egp = v;
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RewardsResponse {
    pub catalog: Vec<CatalogItem>,
    pub settings: PricingSettings,
}
