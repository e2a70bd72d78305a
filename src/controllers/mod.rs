pub mod admin_controller;
pub mod offer_controller;
pub mod referral_controller;
pub mod withdrawal_controller;
