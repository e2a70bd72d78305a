pub mod auth_token;
pub mod referral_code;
