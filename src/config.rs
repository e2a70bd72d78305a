use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::error::Error;
use crate::models::catalog::PricingSettings;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub bcrypt_cost: u32,
    pub referral_bonus_points: i64,
    pub admin_emails: Vec<String>,
    pub offerwall_url: Option<String>,
    pub default_pricing: PricingSettings,
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parsed<T: FromStr>(key: &str, default: T) -> Result<T, Error> {
    match optional(key) {
        Some(raw) => raw
            .parse()
            .map_err(|_| Error::Config(format!("{key} has an invalid value '{raw}'"))),
        None => Ok(default),
    }
}

impl Config {
    /// Defaults for everything except the signing secret.
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            database_url: None,
            db_max_connections: 5,
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            jwt_secret: jwt_secret.into(),
            token_ttl_hours: 24,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            referral_bonus_points: 50,
            admin_emails: Vec::new(),
            offerwall_url: None,
            default_pricing: PricingSettings::default(),
        }
    }

    pub fn from_env() -> Result<Self, Error> {
        let jwt_secret =
            optional("JWT_SECRET").ok_or_else(|| Error::Config("JWT_SECRET must be set".into()))?;
        let defaults = Config::new(jwt_secret);

        let admin_emails = optional("ADMIN_EMAILS")
            .map(|raw| {
                raw.split(',')
                    .map(|e| e.trim().to_lowercase())
                    .filter(|e| !e.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let default_pricing = PricingSettings {
            freefire_per100_points: parsed(
                "FREEFIRE_PER100_POINTS",
                defaults.default_pricing.freefire_per100_points,
            )?,
            pubg_per60_points: parsed(
                "PUBG_PER60_POINTS",
                defaults.default_pricing.pubg_per60_points,
            )?,
            vodafone_points_per_egp: parsed(
                "VODAFONE_POINTS_PER_EGP",
                defaults.default_pricing.vodafone_points_per_egp,
            )?,
        };

        let config = Config {
            database_url: optional("DATABASE_URL"),
            db_max_connections: parsed("DB_MAX_CONNECTIONS", defaults.db_max_connections)?,
            bind_addr: parsed("BIND_ADDR", defaults.bind_addr)?,
            token_ttl_hours: parsed("TOKEN_TTL_HOURS", defaults.token_ttl_hours)?,
            bcrypt_cost: parsed("BCRYPT_COST", defaults.bcrypt_cost)?,
            referral_bonus_points: parsed("REFERRAL_BONUS_POINTS", defaults.referral_bonus_points)?,
            admin_emails,
            offerwall_url: optional("OFFERWALL_URL"),
            default_pricing,
            jwt_secret: defaults.jwt_secret,
        };

        if config.token_ttl_hours <= 0 {
            return Err(Error::Config("TOKEN_TTL_HOURS must be positive".into()));
        }
        if config.referral_bonus_points < 0 {
            return Err(Error::Config("REFERRAL_BONUS_POINTS must not be negative".into()));
        }
        Ok(config)
    }

    pub fn is_admin_email(&self, email: &str) -> bool {
        self.admin_emails.iter().any(|e| e.eq_ignore_ascii_case(email))
    }
}
