//! src/loader.rs
//!
//! Parallel, reproducible sample loading.
//!
//! Example:
//! ```ignore
//! let config = LoaderConfig::builder()
//!     .num_workers(4)
//!     .seed(42)
//!     .build();
//! let loader = SampleLoader::new(dataset, config)?;
//! let samples = loader.load_epoch(0)?; // index order
//! ```
//!
//! # Determinism
//!
//! Index `i` is always handled by worker `i % num_workers`, and each worker
//! processes its shard in ascending order with a generator seeded from
//! `(seed, epoch, worker)`. The random draws a sample sees therefore depend
//! only on the configuration, never on thread scheduling.

use crate::dataset::Dataset;
use crate::rng::{init_worker_rng, WORKER_ID};
use crate::sample::Sample;
use anyhow::{anyhow, ensure, Context, Result};
use crossbeam_channel::{bounded, RecvTimeoutError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for [`SampleLoader`].
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Number of worker threads (0 = load on the calling thread)
    pub num_workers: usize,
    /// Base seed for the per-worker generators; unseeded workers use OS entropy
    pub seed: Option<u64>,
    /// Samples buffered per worker before it blocks
    pub prefetch_factor: usize,
    /// Maximum time to wait for the next sample; on expiry the call returns and
    /// the stuck worker is left to finish in the background
    pub timeout: Duration,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            num_workers: 0,
            seed: None,
            prefetch_factor: 2,
            timeout: Duration::from_secs(30),
        }
    }
}

impl LoaderConfig {
    pub fn builder() -> LoaderConfigBuilder {
        LoaderConfigBuilder::default()
    }
}

/// Builder for LoaderConfig with method chaining
#[derive(Debug, Default)]
pub struct LoaderConfigBuilder {
    config: LoaderConfig,
}

impl LoaderConfigBuilder {
    pub fn num_workers(mut self, workers: usize) -> Self {
        self.config.num_workers = workers;
        self
    }

    /// Set the random seed for reproducible transforms.
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    pub fn prefetch_factor(mut self, factor: usize) -> Self {
        self.config.prefetch_factor = factor;
        self
    }

    /// Set the timeout for receiving a sample from the workers.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn build(self) -> LoaderConfig {
        self.config
    }
}

/// Fetches every sample of a dataset for one epoch, optionally in parallel.
pub struct SampleLoader<D: Dataset> {
    dataset: Arc<D>,
    config: LoaderConfig,
}

impl<D: Dataset + 'static> SampleLoader<D> {
    pub fn new(dataset: D, config: LoaderConfig) -> Result<Self> {
        Self::from_arc(Arc::new(dataset), config)
    }

    pub fn from_arc(dataset: Arc<D>, config: LoaderConfig) -> Result<Self> {
        ensure!(
            config.num_workers == 0 || config.prefetch_factor > 0,
            "prefetch_factor must be > 0 when using workers"
        );
        Ok(Self { dataset, config })
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.dataset.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dataset.is_empty()
    }

    /// Loads all samples of `epoch` and returns them in index order.
    pub fn load_epoch(&self, epoch: usize) -> Result<Vec<Sample>> {
        self.load_indices(&(0..self.dataset.len()).collect::<Vec<_>>(), epoch)
    }

    /// Loads `indices` and returns the samples in the order given.
    ///
    /// Position `k` of `indices` is handled by worker `k % num_workers`.
    pub fn load_indices(&self, indices: &[usize], epoch: usize) -> Result<Vec<Sample>> {
        if self.config.num_workers == 0 {
            return self.load_single_threaded(indices, epoch);
        }
        self.load_parallel(indices, epoch)
    }

    fn load_single_threaded(&self, indices: &[usize], epoch: usize) -> Result<Vec<Sample>> {
        seed_worker(0, epoch, self.config.seed);
        indices
            .iter()
            .map(|&i| self.dataset.get(i).with_context(|| format!("Failed to load sample {}", i)))
            .collect()
    }

    fn load_parallel(&self, indices: &[usize], epoch: usize) -> Result<Vec<Sample>> {
        let num_workers = self.config.num_workers.min(indices.len().max(1));
        let (output_tx, output_rx) = bounded(self.config.prefetch_factor * num_workers);
        let indices: Arc<[usize]> = indices.into();
        let shutdown = Arc::new(AtomicBool::new(false));
        debug!(num_workers, epoch, samples = indices.len(), "starting loader workers");

        let mut workers = Vec::with_capacity(num_workers);
        for worker_id in 0..num_workers {
            let output_tx = output_tx.clone();
            let dataset = self.dataset.clone();
            let indices = indices.clone();
            let shutdown = shutdown.clone();
            let seed = self.config.seed;
            let handle = thread::Builder::new()
                .name(format!("loader-worker-{}", worker_id))
                .spawn(move || {
                    seed_worker(worker_id, epoch, seed);
                    for position in (worker_id..indices.len()).step_by(num_workers) {
                        if shutdown.load(Ordering::Relaxed) {
                            break;
                        }
                        let index = indices[position];
                        let result = dataset
                            .get(index)
                            .with_context(|| format!("Failed to load sample {}", index));
                        let failed = result.is_err();
                        if output_tx.send((position, result)).is_err() || failed {
                            break;
                        }
                    }
                })
                .with_context(|| format!("Failed to spawn worker thread {}", worker_id))?;
            workers.push(handle);
        }
        drop(output_tx);

        // Workers still running when this returns early are detached; they
        // observe `shutdown` or a closed channel and exit on their own.
        let abort = |err: anyhow::Error| -> Result<Vec<Sample>> {
            shutdown.store(true, Ordering::Relaxed);
            Err(err)
        };

        let mut slots: Vec<Option<Sample>> = vec![None; indices.len()];
        for _ in 0..indices.len() {
            let (position, result) = match output_rx.recv_timeout(self.config.timeout) {
                Ok(received) => received,
                Err(RecvTimeoutError::Timeout) => {
                    warn!(timeout = ?self.config.timeout, "loader workers stalled");
                    return abort(anyhow!(
                        "Timed out after {:?} waiting for loader workers",
                        self.config.timeout
                    ));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return abort(anyhow!("Loader workers exited before finishing the epoch"))
                }
            };
            match result {
                Ok(sample) => slots[position] = Some(sample),
                Err(err) => return abort(err),
            }
        }
        drop(output_rx);

        for worker in workers {
            worker.join().map_err(|_| anyhow!("Loader worker panicked"))?;
        }
        slots
            .into_iter()
            .enumerate()
            .map(|(i, s)| s.ok_or_else(|| anyhow!("Missing sample at position {}", i)))
            .collect()
    }
}

fn seed_worker(worker_id: usize, epoch: usize, seed: Option<u64>) {
    WORKER_ID.with(|id| *id.borrow_mut() = worker_id);
    if let Some(seed) = seed {
        init_worker_rng(worker_id, epoch, seed);
    }
}
