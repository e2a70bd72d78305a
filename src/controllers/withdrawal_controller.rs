use axum::{extract::State, http::StatusCode, Extension, Json};
use axum_macros::debug_handler;

use crate::error::Error;
use crate::models::{
    auth::Session,
    catalog::RewardsResponse,
    redemption::{CreateRedemptionDto, RedemptionRequest},
};
use crate::services::{pricing_service, redemption_service};
use crate::state::AppState;

// GET /rewards
#[debug_handler]
pub async fn get_rewards(State(state): State<AppState>) -> Result<Json<RewardsResponse>, Error> {
    Ok(Json(pricing_service::rewards(state.repo()).await?))
}

// POST /withdrawals
#[debug_handler]
pub async fn create_withdrawal(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(payload): Json<CreateRedemptionDto>,
) -> Result<(StatusCode, Json<RedemptionRequest>), Error> {
    let request = redemption_service::create_request(state.repo(), &session, payload).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

// GET /withdrawals
pub async fn list_withdrawals(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<Vec<RedemptionRequest>>, Error> {
    Ok(Json(redemption_service::list_own(state.repo(), &session).await?))
}
