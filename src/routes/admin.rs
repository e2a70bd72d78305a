use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, patch, post},
    Router,
};

use crate::controllers::admin_controller as admin;
use crate::middleware::auth::{admin_middleware, auth_middleware};
use crate::state::AppState;

pub fn admin_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/users", get(admin::list_users))
        .route("/users/:id", patch(admin::patch_user))
        .route("/users/:id/points", post(admin::adjust_points))
        .route("/users/:id/zero", post(admin::zero_points))
        .route("/users/:id/ban", post(admin::ban_user))
        .route("/users/:id/unban", post(admin::unban_user))
        .route("/users/:id/referral-credit", post(admin::referral_credit))
        .route("/withdrawals", get(admin::list_withdrawals))
        .route("/withdrawals/:id", patch(admin::patch_withdrawal))
        .route("/transactions", get(admin::list_transactions))
        .route("/rewards", get(admin::list_rewards).post(admin::create_reward))
        .route(
            "/rewards/:id",
            patch(admin::update_reward).delete(admin::delete_reward),
        )
        .route(
            "/settings",
            get(admin::get_settings).patch(admin::update_settings),
        )
        .route("/audit", get(admin::list_audit))
        // the last layer runs first: authenticate, then check the role
        .layer(from_fn(admin_middleware))
        .layer(from_fn_with_state(state, auth_middleware))
}
