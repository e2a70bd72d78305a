use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::models::redemption::RedemptionStatus;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Unknown user: {0}")]
    UnknownUser(Uuid),

    #[error("Account is banned")]
    BannedAccount,

    #[error("Insufficient balance: {available} available, {required} required")]
    InsufficientBalance { available: i64, required: i64 },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition {
        from: RedemptionStatus,
        to: RedemptionStatus,
    },

    #[error("Referral credit already granted")]
    DuplicateReferralCredit,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("Password hashing error: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Stable machine-readable kind, sent to clients alongside the message.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::UnknownUser(_) => "unknown_user",
            Error::BannedAccount => "banned_account",
            Error::InsufficientBalance { .. } => "insufficient_balance",
            Error::Validation(_) => "validation_error",
            Error::NotFound(_) => "not_found",
            Error::Forbidden => "forbidden",
            Error::Unauthorized(_) => "unauthorized",
            Error::InvalidStateTransition { .. } => "invalid_state_transition",
            Error::DuplicateReferralCredit => "duplicate_referral_credit",
            Error::Conflict(_) => "conflict",
            _ => "internal",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::UnknownUser(_) | Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::BannedAccount | Error::Forbidden => StatusCode::FORBIDDEN,
            Error::InsufficientBalance { .. } | Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::InvalidStateTransition { .. }
            | Error::Conflict(_)
            | Error::DuplicateReferralCredit => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_internal(&self) -> bool {
        self.kind() == "internal"
    }

    /// Maps unique-constraint violations onto the business error they guard.
    pub fn from_unique_violation(err: sqlx::Error, guard: Error) -> Error {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => guard,
            _ => Error::Database(err),
        }
    }

    /// Maps a foreign-key violation (a referenced row vanished) onto `missing`.
    pub fn from_foreign_key_violation(err: sqlx::Error, missing: Error) -> Error {
        match &err {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => missing,
            _ => Error::Database(err),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if self.is_internal() {
            tracing::error!(error = %self, "request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        (
            status,
            Json(json!({
                "status": "error",
                "kind": self.kind(),
                "error": message,
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_errors_keep_their_status() {
        assert_eq!(Error::BannedAccount.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            Error::InsufficientBalance { available: 1, required: 2 }.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::InvalidStateTransition {
                from: RedemptionStatus::Approved,
                to: RedemptionStatus::Rejected
            }
            .kind(),
            "invalid_state_transition"
        );
    }

    #[test]
    fn internal_errors_are_generic() {
        let err = Error::Config("JWT_SECRET".into());
        assert!(err.is_internal());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
