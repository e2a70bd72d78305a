use std::sync::Arc;

use anyhow::Result;
use dotenvy::dotenv;
use tracing_subscriber::EnvFilter;

use points_ledger_api::{
    repositories::{LedgerRepository, MemoryLedgerRepository, PostgresLedgerRepository},
    routes,
    services::offer_service,
    AppState, Config,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,points_ledger_api=debug")),
        )
        .init();

    let config = Config::from_env()?;

    let repo: Arc<dyn LedgerRepository> = match config.database_url.as_deref() {
        Some(url) => {
            let repo = PostgresLedgerRepository::connect(url, config.db_max_connections).await?;
            repo.migrate().await?;
            tracing::info!("connected to Postgres, migrations applied");
            Arc::new(repo)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store; data is lost on exit");
            Arc::new(MemoryLedgerRepository::new(config.default_pricing.clone()))
        }
    };

    let offers = offer_service::provider_for(config.offerwall_url.as_deref())?;
    let bind_addr = config.bind_addr;
    let app = routes::app(AppState::new(repo, config, offers));

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;
    let ctrl_c = async {
        signal::ctrl_c().await.ok();
    };
    #[cfg(unix)]
    let term = async {
        if let Ok(mut s) = signal::unix::signal(signal::unix::SignalKind::terminate()) {
            s.recv().await;
        }
    };
    #[cfg(not(unix))]
    let term = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = term => {},
    }
    tracing::info!("shutdown signal received");
}
