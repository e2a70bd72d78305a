pub mod admin;
pub mod audit;
pub mod auth;
pub mod catalog;
pub mod offer;
pub mod redemption;
pub mod referral;
pub mod transaction;
pub mod user;
