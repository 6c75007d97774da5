use axum::{Router, routing::get};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use tfe_exporter::collection_engine::{self, CollectionEngine};
use tfe_exporter::config::ExporterConfig;
use tfe_exporter::context::ScrapeContext;
use tfe_exporter::handlers;
use tfe_exporter::registry::Registry;
use tfe_exporter::scrapers::{self, ScrapeConfig};
use tfe_exporter::tfe::{TfeApi, TfeClient};
use tfe_exporter::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("tfe_exporter=info,tower_http=info")
        }))
        .init();

    let config_path = std::env::var("TFE_EXPORTER_CONFIG")
        .unwrap_or_else(|_| "./tfe_exporter.toml".to_string());
    let mut config = ExporterConfig::load(&config_path)?;
    config.apply_env();
    config.validate()?;

    let token = config.api.token.clone().unwrap_or_default();
    let client: Arc<dyn TfeApi> = Arc::new(TfeClient::new(
        &config.api.address,
        &token,
        std::time::Duration::from_secs(config.api.request_timeout_secs),
    )?);

    let organizations = if config.organizations.is_empty() {
        let found =
            collection_engine::discover_organizations(client.as_ref(), config.api.page_size).await?;
        tracing::info!("discovered {} organizations", found.len());
        found
    } else {
        config.organizations.clone()
    };
    if organizations.is_empty() {
        tracing::warn!("no organizations to collect from");
    }

    let scrapers = scrapers::default_scrapers(&config.scrapers);
    for s in &scrapers {
        tracing::info!("scraper {} enabled: {}", s.name(), s.help());
    }

    let registry = Arc::new(Registry::for_scrapers(&scrapers)?);
    let engine = Arc::new(CollectionEngine::new(
        scrapers,
        ScrapeConfig {
            client,
            organizations,
            page_size: config.api.page_size,
            policy: config.policy.clone(),
        },
        registry.clone(),
        config.collection.timeout(),
        config.collection.sink_capacity,
    ));

    let shutdown = ScrapeContext::new();
    let engine_handle = collection_engine::spawn_collection_engine(
        engine,
        config.collection.interval(),
        shutdown.clone(),
    );

    let state = AppState { registry };

    let app = Router::new()
        .route("/metrics", get(handlers::metrics::metrics))
        .route("/healthz", get(handlers::health::healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = config.server.listen.parse()?;
    tracing::info!("tfe-exporter listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    engine_handle.await?;
    Ok(())
}

async fn shutdown_signal(shutdown: ScrapeContext) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutting down"),
        Err(e) => tracing::error!("failed to listen for ctrl-c, shutting down: {e}"),
    }
    shutdown.cancel();
}
