use axum::{
    body::Body,
    extract::{Query, State},
    http::{header::AUTHORIZATION, Request},
    middleware::Next,
    response::Response,
    Extension,
};
use serde::Deserialize;

use crate::error::Error;
use crate::models::auth::Session;
use crate::services::auth_service;
use crate::state::AppState;

#[derive(Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Bearer header first, then `?token=`.
fn extract_token(req: &Request<Body>) -> Option<String> {
    let from_header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string());

    from_header.filter(|t| !t.is_empty()).or_else(|| {
        Query::<TokenQuery>::try_from_uri(req.uri())
            .ok()
            .and_then(|Query(q)| q.token)
            .filter(|t| !t.is_empty())
    })
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, Error> {
    let token = extract_token(&req)
        .ok_or_else(|| Error::Unauthorized("missing credentials".into()))?;

    let session = auth_service::resolve_session(state.repo(), &state.config, &token).await?;
    req.extensions_mut().insert(session);
    Ok(next.run(req).await)
}

/// Must run inside `auth_middleware`.
pub async fn admin_middleware(
    Extension(session): Extension<Session>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, Error> {
    if !session.is_admin() {
        tracing::warn!(user_id = %session.user_id, path = %req.uri().path(), "non-admin hit an admin route");
        return Err(Error::Forbidden);
    }
    Ok(next.run(req).await)
}
