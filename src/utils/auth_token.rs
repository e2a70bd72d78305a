use chrono::{Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;
use crate::models::{auth::IssuedToken, user::User};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub role: String,
    pub email: String,
}

impl Claims {
    pub fn user_id(&self) -> Result<Uuid, Error> {
        Uuid::parse_str(&self.sub).map_err(|_| Error::Unauthorized("malformed token subject".into()))
    }
}

pub fn issue_token(user: &User, secret: &str, ttl_hours: i64) -> Result<IssuedToken, Error> {
    let expires_at = Utc::now() + Duration::hours(ttl_hours);
    let claims = Claims {
        sub: user.id.to_string(),
        exp: expires_at.timestamp() as usize,
        role: user.role.to_string(),
        email: user.email.clone(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(IssuedToken { token, expires_at })
}

/// Checks signature and expiry. Any failure is reported as `Unauthorized`.
pub fn decode_token(token: &str, secret: &str) -> Result<Claims, Error> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::debug!(error = %e, "rejected token");
        Error::Unauthorized("invalid or expired token".into())
    })
}

pub fn expires_at(claims: &Claims) -> chrono::DateTime<Utc> {
    Utc.timestamp_opt(claims.exp as i64, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::{Role, UserStatus};

    fn user() -> User {
        User {
            id: Uuid::new_v4(),
            email: "a@b.co".into(),
            points: 0,
            role: Role::Admin,
            status: UserStatus::Active,
            referral_code: "ABCD1234".into(),
            referred_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn issued_token_decodes_with_same_secret() {
        let user = user();
        let issued = issue_token(&user, "secret", 1).unwrap();
        let claims = decode_token(&issued.token, "secret").unwrap();
        assert_eq!(claims.user_id().unwrap(), user.id);
        assert_eq!(claims.role, "admin");
        assert_eq!(expires_at(&claims).timestamp(), issued.expires_at.timestamp());
    }

    #[test]
    fn wrong_secret_or_expiry_is_unauthorized() {
        let user = user();
        let issued = issue_token(&user, "secret", 1).unwrap();
        assert!(matches!(
            decode_token(&issued.token, "other"),
            Err(Error::Unauthorized(_))
        ));

        let expired = issue_token(&user, "secret", -2).unwrap();
        assert!(matches!(
            decode_token(&expired.token, "secret"),
            Err(Error::Unauthorized(_))
        ));
        assert!(decode_token("garbage", "secret").is_err());
    }
}
