//! Asset downloader.
//!
//! Turns a batch of media references into public URLs right away and hands
//! the actual downloads to a bounded worker pool. The URL is *reserved* when
//! returned; the asset is *materialized* later, or never if its download
//! fails. Callers that need the stronger guarantee can await the ticket or
//! ask [`AssetStore::state`].

mod broker;
mod worker;

pub use broker::{DownloadBroker, DownloadJob};
pub use worker::{process_job, spawn_workers};

use reqwest::Url;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::fetch::Fetcher;
use crate::ident::IdGenerator;
use crate::observability::Metrics;
use crate::storage::{AssetStore, StorageError};

/// Extension of every stored asset
pub const ASSET_EXTENSION: &str = "mp3";

/// Query parameter carrying the media reference
pub const MEDIA_ID_PARAM: &str = "mediaid";

/// Final result of one background download
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetOutcome {
    Stored { path: PathBuf, size: usize },
    Failed { reason: String },
    /// The job was dropped before a worker reported back
    Abandoned,
}

/// Handle for one reserved asset
#[derive(Debug)]
pub struct DownloadTicket {
    pub filename: String,
    pub url: String,
    completion: oneshot::Receiver<AssetOutcome>,
}

impl DownloadTicket {
    /// Wait for the background download to finish
    pub async fn wait(self) -> AssetOutcome {
        self.completion.await.unwrap_or(AssetOutcome::Abandoned)
    }
}

/// Download worker pool sizing
#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub workers: usize,
    pub queue_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 8,
            queue_capacity: 64,
        }
    }
}

pub struct AssetDownloader {
    broker: DownloadBroker,
    store: Arc<AssetStore>,
    ids: Arc<IdGenerator>,
    media_endpoint: Url,
    metrics: Arc<Metrics>,
}

impl AssetDownloader {
    /// Build the downloader and spawn its workers on the current runtime
    pub fn start(
        pool: PoolConfig,
        media_endpoint: Url,
        fetcher: Arc<dyn Fetcher>,
        store: Arc<AssetStore>,
        ids: Arc<IdGenerator>,
        metrics: Arc<Metrics>,
    ) -> (Self, Vec<JoinHandle<()>>) {
        let (broker, receivers) = DownloadBroker::new(pool.workers, pool.queue_capacity);
        let handles = spawn_workers(receivers, fetcher, store.clone(), metrics.clone());

        let downloader = Self {
            broker,
            store,
            ids,
            media_endpoint,
            metrics,
        };

        (downloader, handles)
    }

    pub fn store(&self) -> &AssetStore {
        &self.store
    }

    pub fn is_healthy(&self) -> bool {
        self.broker.health_check()
    }

    pub fn num_workers(&self) -> usize {
        self.broker.num_workers()
    }

    /// Retrieval URL for a media reference
    pub fn source_url(&self, media_id: &str) -> Url {
        let mut url = self.media_endpoint.clone();
        url.query_pairs_mut().append_pair(MEDIA_ID_PARAM, media_id);
        url
    }

    /// Reserve one file per reference and queue its download.
    ///
    /// Returns one ticket per reference, in input order, without waiting for
    /// any download. All filenames share one fresh token and differ by index.
    pub async fn download_all(&self, media_ids: &[String]) -> Result<Vec<DownloadTicket>, StorageError> {
        let token = self.ids.next_token();
        let mut tickets = Vec::with_capacity(media_ids.len());

        for (i, media_id) in media_ids.iter().enumerate() {
            let filename = format!("{token}{i}.{ASSET_EXTENSION}");
            let source_url = self.source_url(media_id).to_string();
            // Released on drop, including when this future is cancelled mid-submit
            let reservation = self.store.reserve(&filename)?;
            let url = reservation.url();

            let (done, completion) = oneshot::channel();
            let job = DownloadJob {
                media_id: media_id.clone(),
                source_url,
                filename: filename.clone(),
                done,
            };

            let queued = self.broker.submit(job).await;
            self.metrics.asset_queued();
            if queued {
                reservation.commit();
                debug!(%media_id, %filename, "Download queued");
            } else {
                drop(reservation);
                self.metrics.asset_failed();
                warn!(%media_id, %filename, "Download not queued, URL will not resolve");
            }

            tickets.push(DownloadTicket {
                filename,
                url,
                completion,
            });
        }

        Ok(tickets)
    }

    /// Public URLs for a batch; downloads continue in the background
    pub async fn download_urls(&self, media_ids: &[String]) -> Result<Vec<String>, StorageError> {
        let tickets = self.download_all(media_ids).await?;
        Ok(tickets.into_iter().map(|ticket| ticket.url).collect())
    }
}
