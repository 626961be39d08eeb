use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use tracing_subscriber::EnvFilter;

use leadgen_api::config::AppConfig;
use leadgen_api::database::{DatabaseManager, MemoryStore, PgStore};
use leadgen_api::services::{NoopNotifier, Notifier, WebhookNotifier};
use leadgen_api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("leadgen_api=info,tower_http=info")),
        )
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;
    tracing::info!("Starting Lead Generation API in {:?} mode", config.environment);

    let state = match config.database.url {
        Some(_) => {
            let pool = DatabaseManager::connect(&config.database).await?;
            let store = Arc::new(PgStore::new(pool));
            let notifier = notifier(&config, store.clone())?;
            AppState::new(config, store, notifier)
        }
        None if config.is_development() => {
            tracing::warn!("DATABASE_URL not set; using the in-memory store (data is lost on exit)");
            let store = Arc::new(MemoryStore::new());
            let notifier = notifier(&config, store.clone())?;
            AppState::new(config, store, notifier)
        }
        None => bail!("DATABASE_URL must be set outside development"),
    };

    let port = state.config.server.port;
    let app = leadgen_api::app(state);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Lead Generation API listening on http://{}", bind_addr);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

fn notifier(config: &AppConfig, store: Arc<dyn leadgen_api::database::Store>) -> anyhow::Result<Arc<dyn Notifier>> {
    if !config.notify.enabled {
        return Ok(Arc::new(NoopNotifier));
    }
    let timeout = Duration::from_millis(config.notify.timeout_ms);
    Ok(Arc::new(WebhookNotifier::new(store, timeout)?))
}
