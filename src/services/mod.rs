pub mod admin_service;
pub mod auth_service;
pub mod ledger_service;
pub mod offer_service;
pub mod pricing_service;
pub mod redemption_service;
pub mod referral_service;
