use crate::error::Error;
use crate::models::catalog::{CatalogItem, PricingSettings, RewardMethod, RewardsResponse};
use crate::repositories::LedgerRepository;

/// Rates are applied as whole millionths of a point, so decimal rates such
/// as 1.1 price exactly instead of picking up binary float error.
const RATE_SCALE: i128 = 1_000_000;

/// `ceil(qty * rate / per)` in integer arithmetic. Saturates at `i64::MAX`.
fn ceil_points(qty: i64, rate: f64, per: i64) -> i64 {
    let scaled_rate = (rate * RATE_SCALE as f64).round();
    if scaled_rate.is_nan() || scaled_rate <= 0.0 {
        return 0;
    }
    let denominator = i128::from(per) * RATE_SCALE;
    i128::from(qty)
        .checked_mul(scaled_rate as i128)
        .and_then(|numerator| numerator.checked_add(denominator - 1))
        .map(|rounded| rounded / denominator)
        .and_then(|points| i64::try_from(points).ok())
        .unwrap_or(i64::MAX)
}

/// Price in points for `qty` units of `method`. An explicit catalog price
/// always wins; otherwise the method's formula is applied and rounded up.
pub fn price_for(
    method: RewardMethod,
    qty: i64,
    explicit_price_points: i64,
    settings: &PricingSettings,
) -> i64 {
    if explicit_price_points > 0 {
        return explicit_price_points;
    }
    if qty <= 0 {
        return 0;
    }
    match method {
        RewardMethod::Freefire => ceil_points(qty, settings.freefire_per100_points, 100),
        RewardMethod::Pubg => ceil_points(qty, settings.pubg_per60_points, 60),
        RewardMethod::VodafoneCash => ceil_points(qty, settings.vodafone_points_per_egp, 1),
    }
}

pub fn quote(item: &CatalogItem, settings: &PricingSettings) -> i64 {
    price_for(item.method, item.qty, item.price_points, settings)
}

/// Resolves the price with the settings currently stored.
pub async fn current_price(repo: &dyn LedgerRepository, item: &CatalogItem) -> Result<i64, Error> {
    let settings = repo.pricing_settings().await?;
    Ok(quote(item, &settings))
}

/// Public catalog: enabled items only, with the rates used for formula prices.
pub async fn rewards(repo: &dyn LedgerRepository) -> Result<RewardsResponse, Error> {
    Ok(RewardsResponse {
        catalog: repo.list_catalog(false).await?,
        settings: repo.pricing_settings().await?,
    })
}
