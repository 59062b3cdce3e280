//! HTTP server for the advisor

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use mcp::ToolEndpoint;
use policy::Guardrails;
use runtime::{Advisor, HttpBackend, ModelInvoker};
use storage::HistoryStore;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::routes;

/// The advisor as wired for production use.
pub type Service = Advisor<HttpBackend, ToolEndpoint>;

const CLEANUP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Application state shared across handlers
pub struct AppState {
    pub advisor: Service,
}

/// Build the advisor from configuration. The tool endpoint starts
/// disconnected.
pub fn build_advisor(config: &Config) -> Result<Service> {
    let guardrails = Guardrails::new(&config.guardrails)?;
    let store = open_store(&config.storage.path)?;
    let backend = HttpBackend::builder(config.api_keys()).build()?;
    let invoker = ModelInvoker::new(config.registry()?, backend);
    let endpoint = ToolEndpoint::with_timeout(config.endpoint_config().timeout);

    Ok(Advisor::new(invoker, endpoint, guardrails, store).with_settings(config.advisor_settings()))
}

/// Open the history store, creating its directory if needed.
pub fn open_store(path: &Path) -> Result<HistoryStore> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(HistoryStore::open(path)?)
}

/// Connect the advisor's tool endpoint. Failure leaves tools unavailable.
pub async fn connect_tools(advisor: &Service, config: &Config) -> bool {
    let endpoint = config.endpoint_config();
    match advisor.tools().connect(&endpoint.url, &endpoint.headers).await {
        Ok(()) => true,
        Err(e) => {
            warn!(url = %endpoint.url, error = %e, "failed to connect to tool endpoint, tools unavailable");
            false
        }
    }
}

/// Run the HTTP server until Ctrl-C.
pub async fn run(config: &Config) -> Result<()> {
    let advisor = build_advisor(config)?;
    connect_tools(&advisor, config).await;

    let state = Arc::new(AppState { advisor });
    let cleanup = tokio::spawn(cleanup_loop(state.clone(), config.storage.session_ttl_days));

    let app = Router::new()
        .merge(routes::router())
        .with_state(state.clone())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = config.listen_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, version = env!("CARGO_PKG_VERSION"), "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cleanup.abort();
    state.advisor.tools().disconnect().await;
    info!("server stopped");
    Ok(())
}

async fn cleanup_loop(state: Arc<AppState>, ttl_days: u32) {
    let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
    loop {
        interval.tick().await;
        match state.advisor.cleanup_expired(ttl_days).await {
            Ok(count) => info!(count, ttl_days, "session cleanup finished"),
            Err(e) => error!(error = %e, "session cleanup failed"),
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
    }
    info!("shutting down gracefully");
}
