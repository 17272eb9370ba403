//! Download workers - fetch one asset and write it to the store

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::AssetOutcome;
use super::broker::DownloadJob;
use crate::fetch::Fetcher;
use crate::observability::Metrics;
use crate::storage::AssetStore;

/// Spawn one task per receiver. Each task ends once its channel is closed
/// and drained.
pub fn spawn_workers(
    receivers: Vec<mpsc::Receiver<DownloadJob>>,
    fetcher: Arc<dyn Fetcher>,
    store: Arc<AssetStore>,
    metrics: Arc<Metrics>,
) -> Vec<JoinHandle<()>> {
    receivers
        .into_iter()
        .enumerate()
        .map(|(worker_id, mut rx)| {
            let fetcher = fetcher.clone();
            let store = store.clone();
            let metrics = metrics.clone();

            tokio::spawn(async move {
                while let Some(job) = rx.recv().await {
                    let outcome = process_job(&job, fetcher.as_ref(), &store).await;

                    match &outcome {
                        AssetOutcome::Stored { .. } => metrics.asset_stored(),
                        _ => metrics.asset_failed(),
                    }

                    // Nobody may be listening any more
                    let _ = job.done.send(outcome);
                }
                info!(worker_id, "Download worker stopped");
            })
        })
        .collect()
}

/// Fetch and store a single asset. Errors are logged and turned into an
/// outcome, never propagated.
pub async fn process_job(job: &DownloadJob, fetcher: &dyn Fetcher, store: &AssetStore) -> AssetOutcome {
    let bytes = match fetcher.fetch(&job.source_url).await {
        Ok(bytes) => bytes,
        Err(e) => {
            store.release(&job.filename);
            warn!(
                media_id = %job.media_id,
                url = %job.source_url,
                filename = %job.filename,
                error = %e,
                "Asset download failed"
            );
            return AssetOutcome::Failed {
                reason: e.to_string(),
            };
        }
    };

    match store.materialize(&job.filename, &bytes).await {
        Ok(path) => {
            info!(
                media_id = %job.media_id,
                filename = %job.filename,
                size = bytes.len(),
                "Asset stored"
            );
            AssetOutcome::Stored {
                path,
                size: bytes.len(),
            }
        }
        Err(e) => {
            warn!(
                media_id = %job.media_id,
                filename = %job.filename,
                error = %e,
                "Asset write failed"
            );
            AssetOutcome::Failed {
                reason: e.to_string(),
            }
        }
    }
}
