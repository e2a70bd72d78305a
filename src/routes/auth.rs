use axum::{
    extract::State,
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, post},
    Extension, Json, Router,
};
use serde_json::json;

use crate::controllers::{offer_controller, referral_controller, withdrawal_controller};
use crate::error::Error;
use crate::middleware::auth::auth_middleware;
use crate::models::{
    auth::Session,
    user::{LoginUser, RegisterUser, UserProfileDto},
};
use crate::services::auth_service;
use crate::state::AppState;

pub fn auth_routes(state: AppState) -> Router<AppState> {
    let public_routes = Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/rewards", get(withdrawal_controller::get_rewards))
        .route("/offers", get(offer_controller::list_offers));

    let protected_routes = Router::new()
        .route("/me", get(get_profile))
        .route(
            "/withdrawals",
            get(withdrawal_controller::list_withdrawals)
                .post(withdrawal_controller::create_withdrawal),
        )
        .route("/referrals/stats", get(referral_controller::stats))
        .route("/referrals/latest", get(referral_controller::latest))
        .layer(from_fn_with_state(state, auth_middleware));

    public_routes.merge(protected_routes)
}

pub async fn get_profile(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<UserProfileDto>, Error> {
    Ok(Json(auth_service::profile(state.repo(), &session).await?))
}

async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterUser>,
) -> Result<(StatusCode, Json<serde_json::Value>), Error> {
    let user = auth_service::register(state.repo(), &state.config, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "status": "success",
            "message": "User registered successfully",
            "user": UserProfileDto::from(user),
        })),
    ))
}

async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginUser>,
) -> Result<Json<serde_json::Value>, Error> {
    let issued = auth_service::login(state.repo(), &state.config, payload).await?;
    Ok(Json(json!({
        "status": "success",
        "message": "Login successful",
        "token": issued.token,
        "expiresAt": issued.expires_at,
    })))
}
