use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::AssetOutcome;

/// One asset to fetch and store
#[derive(Debug)]
pub struct DownloadJob {
    pub media_id: String,
    pub source_url: String,
    pub filename: String,
    pub done: oneshot::Sender<AssetOutcome>,
}

/// Distributes download jobs to the worker pool.
///
/// Jobs are sent round-robin over one bounded channel per worker, skipping
/// full channels. When every channel is full `submit` waits, which is the
/// only backpressure the pipeline has.
pub struct DownloadBroker {
    worker_channels: Vec<mpsc::Sender<DownloadJob>>,
    next_worker: AtomicUsize,
}

impl DownloadBroker {
    /// Returns the broker and one receiver per worker
    pub fn new(num_workers: usize, channel_size: usize) -> (Self, Vec<mpsc::Receiver<DownloadJob>>) {
        info!(num_workers, channel_size, "Creating DownloadBroker with worker channels");

        let mut worker_channels = Vec::with_capacity(num_workers);
        let mut worker_receivers = Vec::with_capacity(num_workers);

        for worker_id in 0..num_workers {
            let (tx, rx) = mpsc::channel(channel_size);
            worker_channels.push(tx);
            worker_receivers.push(rx);
            debug!(worker_id, "Created worker channel");
        }

        let broker = Self {
            worker_channels,
            next_worker: AtomicUsize::new(0),
        };

        (broker, worker_receivers)
    }

    /// Hand a job to the pool.
    ///
    /// Starts at the next worker in round-robin order and takes the first
    /// channel with room. Only when every channel is full does it wait, on
    /// the round-robin choice. Returns false if the job could not be
    /// delivered; the job is dropped, which closes its completion channel.
    pub async fn submit(&self, job: DownloadJob) -> bool {
        let num_workers = self.worker_channels.len();
        if num_workers == 0 {
            warn!(filename = %job.filename, "No download workers, job dropped");
            return false;
        }

        let start = self.next_worker.fetch_add(1, Ordering::Relaxed) % num_workers;
        let filename = job.filename.clone();

        let mut job = job;
        for offset in 0..num_workers {
            let worker_idx = (start + offset) % num_workers;
            match self.worker_channels[worker_idx].try_send(job) {
                Ok(()) => {
                    debug!(%filename, worker_idx, "Job sent to worker");
                    return true;
                }
                Err(TrySendError::Full(returned) | TrySendError::Closed(returned)) => job = returned,
            }
        }

        debug!(%filename, worker_idx = start, "All worker queues full, waiting");
        match self.worker_channels[start].send(job).await {
            Ok(()) => {
                debug!(%filename, worker_idx = start, "Job sent to worker");
                true
            }
            Err(_) => {
                warn!(%filename, worker_idx = start, "Worker channel closed, job not delivered");
                false
            }
        }
    }

    pub fn num_workers(&self) -> usize {
        self.worker_channels.len()
    }

    /// True while every worker is still receiving
    pub fn health_check(&self) -> bool {
        self.worker_channels.iter().all(|ch| !ch.is_closed())
    }
}
