use bcrypt::{hash, verify};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::Error;
use crate::models::{
    auth::{Actor, IssuedToken, Session},
    user::{LoginUser, NewUser, RegisterUser, Role, User, UserProfileDto},
};
use crate::repositories::LedgerRepository;
use crate::services::referral_service;
use crate::utils::{auth_token, referral_code};

pub const MIN_PASSWORD_LEN: usize = 6;

fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Creates the account and, when a known referral code was given, links the
/// referrer and pays the referral bonus.
pub async fn register(
    repo: &dyn LedgerRepository,
    config: &Config,
    payload: RegisterUser,
) -> Result<User, Error> {
    let email = normalize_email(&payload.email);
    if !email.contains('@') {
        return Err(Error::Validation("a valid email is required".into()));
    }
    if payload.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(Error::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let referred_by = match payload
        .referral_code
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
    {
        Some(code) => match repo.find_by_referral_code(&code.to_uppercase()).await? {
            Some(referrer) => Some(referrer.id),
            None => {
                warn!(code, "registration with unknown referral code");
                None
            }
        },
        None => None,
    };

    let password_hash = hash(&payload.password, config.bcrypt_cost)?;
    let role = if config.is_admin_email(&email) {
        Role::Admin
    } else {
        Role::User
    };

    let user = repo
        .insert_user(NewUser {
            email,
            password_hash,
            role,
            referral_code: referral_code::generate(),
            referred_by,
        })
        .await?;
    info!(user_id = %user.id, role = %user.role, referred = referred_by.is_some(), "user registered");

    if referred_by.is_some() {
        // the account exists at this point; a failed bonus is retried by an admin
        if let Err(e) = referral_service::credit_referrer(
            repo,
            user.id,
            config.referral_bonus_points,
            Actor::System,
        )
        .await
        {
            error!(user_id = %user.id, error = %e, "referral bonus failed");
        }
    }

    Ok(user)
}

pub async fn login(
    repo: &dyn LedgerRepository,
    config: &Config,
    payload: LoginUser,
) -> Result<IssuedToken, Error> {
    let invalid = || Error::Unauthorized("invalid email or password".into());

    let credentials = repo
        .find_credentials(&normalize_email(&payload.email))
        .await?
        .ok_or_else(invalid)?;
    if !verify(&payload.password, &credentials.password_hash)? {
        return Err(invalid());
    }

    let issued = auth_token::issue_token(
        &credentials.user,
        &config.jwt_secret,
        config.token_ttl_hours,
    )?;
    info!(user_id = %credentials.user.id, "login");
    Ok(issued)
}

/// Turns a bearer credential into a session. Role and status are read from
/// the store so bans and demotions apply to tokens already issued.
pub async fn resolve_session(
    repo: &dyn LedgerRepository,
    config: &Config,
    token: &str,
) -> Result<Session, Error> {
    let claims = auth_token::decode_token(token, &config.jwt_secret)?;
    let user_id = claims.user_id()?;
    let user = repo
        .get_user(user_id)
        .await?
        .ok_or_else(|| Error::Unauthorized("account no longer exists".into()))?;
    Ok(Session::from_user(&user, auth_token::expires_at(&claims)))
}

pub async fn profile(
    repo: &dyn LedgerRepository,
    session: &Session,
) -> Result<UserProfileDto, Error> {
    let user = repo
        .get_user(session.user_id)
        .await?
        .ok_or(Error::UnknownUser(session.user_id))?;
    Ok(user.into())
}
