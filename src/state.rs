use std::sync::Arc;

use crate::config::Config;
use crate::repositories::LedgerRepository;
use crate::services::offer_service::OfferProvider;

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn LedgerRepository>,
    pub config: Arc<Config>,
    pub offers: Arc<dyn OfferProvider>,
}

impl AppState {
    pub fn new(
        repo: Arc<dyn LedgerRepository>,
        config: Config,
        offers: Arc<dyn OfferProvider>,
    ) -> Self {
        Self {
            repo,
            config: Arc::new(config),
            offers,
        }
    }

    pub fn repo(&self) -> &dyn LedgerRepository {
        self.repo.as_ref()
    }
}
