use axum::{
    extract::{Query, State},
    Extension, Json,
};

use crate::error::Error;
use crate::models::{
    admin::LimitQuery,
    auth::Session,
    referral::{ReferralStats, ReferredUsers},
};
use crate::services::referral_service;
use crate::state::AppState;

// GET /referrals/stats
pub async fn stats(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<ReferralStats>, Error> {
    Ok(Json(referral_service::stats(state.repo(), &session).await?))
}

// GET /referrals/latest
pub async fn latest(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<ReferredUsers>, Error> {
    Ok(Json(
        referral_service::latest(state.repo(), &session, query.limit).await?,
    ))
}
