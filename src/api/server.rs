use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{Router, routing::get};
use reqwest::Url;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{info, warn};

use super::{
    services::{asset_status, handshake, health, receive_message},
    state::AppState,
};
use crate::config::Config;
use crate::downloader::AssetDownloader;
use crate::fetch::{Fetcher, HttpClient};
use crate::ident::IdGenerator;
use crate::observability::Metrics;
use crate::storage::{AssetStore, PUBLIC_PREFIX};

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// How long in-flight downloads may run after the listener stops
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Route table shared by the binary and the integration tests
pub fn build_router(state: AppState) -> Router {
    let voice_dir = state.downloader.store().dir().to_path_buf();

    Router::new()
        .route("/wx", get(handshake).post(receive_message))
        .route("/voice-status/{filename}", get(asset_status))
        .route("/health", get(health))
        .nest_service(&format!("/{PUBLIC_PREFIX}"), ServeDir::new(voice_dir))
        .with_state(state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

pub async fn run(address: Option<SocketAddr>, config_path: Option<PathBuf>) -> Result<(), AnyError> {
    info!("Loading configuration");
    let mut config = Config::load(config_path).map_err(|e| format!("Failed to load config: {}", e))?;
    if let Some(address) = address {
        config.server.bind_addr = address;
    }

    info!(dir = %config.storage.dir.display(), "Opening asset store");
    let store = Arc::new(
        AssetStore::open(config.storage.dir.clone(), &config.storage.public_base_url)
            .map_err(|e| format!("Failed to open asset store: {}", e))?,
    );

    let fetcher: Arc<dyn Fetcher> = Arc::new(
        HttpClient::new(config.downloader.http()).map_err(|e| format!("Failed to build HTTP client: {}", e))?,
    );
    let media_endpoint = Url::parse(&config.wechat.media_endpoint)
        .map_err(|e| format!("Invalid media endpoint: {}", e))?;

    let metrics = Arc::new(Metrics::new());
    let (downloader, workers) = AssetDownloader::start(
        config.downloader.pool(),
        media_endpoint,
        fetcher.clone(),
        store,
        Arc::new(IdGenerator::new()),
        metrics.clone(),
    );

    let address = config.server.bind_addr;
    let state = AppState::new(config, fetcher, downloader, metrics);
    let app = build_router(state);

    let listener = TcpListener::bind(address).await?;
    info!(%address, "wxvoice listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router (and with it the broker) is gone, so workers exit once
    // their queues are drained.
    info!(workers = workers.len(), "Draining download workers");
    let drain = async {
        for worker in workers {
            let _ = worker.await;
        }
    };
    if tokio::time::timeout(DRAIN_TIMEOUT, drain).await.is_err() {
        warn!("Download workers still busy after drain timeout, exiting anyway");
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = signal(SignalKind::terminate())
            .expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
