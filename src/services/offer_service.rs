use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::Error;
use crate::models::offer::{Offer, OfferQuery};

pub const DEFAULT_MAX_OFFERS: u32 = 50;

/// Source of externally hosted offers. Listing offers never touches the ledger.
#[async_trait]
pub trait OfferProvider: Send + Sync {
    async fn fetch(&self, query: &OfferQuery) -> Result<Vec<Offer>, Error>;
}

pub struct HttpOfferProvider {
    client: Client,
    url: String,
}

impl HttpOfferProvider {
    pub fn new(url: impl Into<String>) -> Result<Self, Error> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl OfferProvider for HttpOfferProvider {
    async fn fetch(&self, query: &OfferQuery) -> Result<Vec<Offer>, Error> {
        let max = query.max.unwrap_or(DEFAULT_MAX_OFFERS);
        let mut params = vec![("max", max.to_string())];
        if let Some(ua) = query.user_agent.as_deref().filter(|ua| !ua.is_empty()) {
            params.push(("user_agent", ua.to_string()));
        }

        let response = self.client.get(&self.url).query(&params).send().await?;
        if !response.status().is_success() {
            warn!(status = %response.status(), "offer feed returned an error");
            return Ok(Vec::new());
        }
        let payload: Value = response.json().await?;
        let mut offers = Offer::normalize_feed(&payload);
        offers.truncate(max as usize);
        debug!(count = offers.len(), "offers fetched");
        Ok(offers)
    }
}

/// Used when no offer wall is configured.
pub struct DisabledOfferProvider;

#[async_trait]
impl OfferProvider for DisabledOfferProvider {
    async fn fetch(&self, _query: &OfferQuery) -> Result<Vec<Offer>, Error> {
        Ok(Vec::new())
    }
}

pub fn provider_for(url: Option<&str>) -> Result<std::sync::Arc<dyn OfferProvider>, Error> {
    match url {
        Some(url) => Ok(std::sync::Arc::new(HttpOfferProvider::new(url)?)),
        None => Ok(std::sync::Arc::new(DisabledOfferProvider)),
    }
}

/// Fetches offers, degrading to an empty list when the upstream is unreachable.
pub async fn list_offers(provider: &dyn OfferProvider, query: &OfferQuery) -> Vec<Offer> {
    match provider.fetch(query).await {
        Ok(offers) => offers,
        Err(e) => {
            warn!(error = %e, "offer feed unavailable");
            Vec::new()
        }
    }
}
