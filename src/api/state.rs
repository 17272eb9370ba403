use std::sync::Arc;

use crate::config::Config;
use crate::downloader::AssetDownloader;
use crate::fetch::Fetcher;
use crate::observability::Metrics;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub fetcher: Arc<dyn Fetcher>,
    pub downloader: Arc<AssetDownloader>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(
        config: Config,
        fetcher: Arc<dyn Fetcher>,
        downloader: AssetDownloader,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            fetcher,
            downloader: Arc::new(downloader),
            metrics,
        }
    }

    pub fn token(&self) -> &str {
        &self.config.wechat.token
    }
}
