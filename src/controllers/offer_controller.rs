use axum::{
    extract::{Query, State},
    http::{header::USER_AGENT, HeaderMap},
    Json,
};

use crate::models::offer::{OfferList, OfferQuery};
use crate::services::offer_service;
use crate::state::AppState;

// GET /offers
pub async fn list_offers(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(mut query): Query<OfferQuery>,
) -> Json<OfferList> {
    if query.user_agent.is_none() {
        query.user_agent = headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
    }
    let offers = offer_service::list_offers(state.offers.as_ref(), &query).await;
    Json(OfferList { offers })
}
