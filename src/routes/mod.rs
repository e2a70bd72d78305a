pub mod admin;
pub mod auth;

use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

use crate::error::Error;
use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(health_check))
        .merge(auth::auth_routes(state.clone()))
        .nest("/admin", admin::admin_routes(state.clone()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// GET / pings the store
async fn health_check(State(state): State<AppState>) -> Result<Json<Value>, Error> {
    state.repo().health().await?;
    Ok(Json(json!({ "status": "success", "message": "API & store healthy" })))
}
