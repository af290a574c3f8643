//! # Worker Pool
//!
//! Runs one phase: `parallelism` workers, each on its own Tokio task with its
//! own issuer and its own sample buffers, all sharing one deadline. The pool
//! waits for every worker before returning. The first failure aborts the
//! remaining workers and fails the phase as a whole.

use crate::config::Prompt;
use crate::error::{BenchmarkError, BenchmarkResult};
use crate::issuer::IssuerFactory;
use crate::metrics::WorkerResult;
use crate::worker::Worker;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info};

/// Everything a finished phase hands to the aggregator.
#[derive(Debug)]
pub struct PhaseOutcome {
    /// Per-worker results ordered by worker id
    pub results: Vec<WorkerResult>,
    /// Wall-clock time from deadline computation until the last worker joined
    pub wall_time: Duration,
}

/// Launches and joins the workers of a phase.
pub struct WorkerPool {
    factory: Arc<dyn IssuerFactory>,
    prompt: Arc<Prompt>,
    request_timeout: Duration,
}

impl WorkerPool {
    pub fn new(
        factory: Arc<dyn IssuerFactory>,
        prompt: Arc<Prompt>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            factory,
            prompt,
            request_timeout,
        }
    }

    /// Run `parallelism` workers for `duration`.
    ///
    /// ## Returns
    /// - `Ok(PhaseOutcome)`: every worker finished; results in worker id order
    /// - `Err(BenchmarkError)`: the first worker failure; other workers are aborted
    pub async fn run(
        &self,
        parallelism: usize,
        duration: Duration,
    ) -> BenchmarkResult<PhaseOutcome> {
        if parallelism == 0 {
            return Err(BenchmarkError::Configuration(
                "parallelism must be at least 1".to_string(),
            ));
        }

        // Build every worker up front so client construction does not eat into
        // the measured window.
        let mut workers = Vec::with_capacity(parallelism);
        for worker_id in 1..=parallelism {
            let issuer = self
                .factory
                .create(worker_id, parallelism)
                .map_err(|source| BenchmarkError::Request {
                    worker_id,
                    parallelism,
                    source: source.context("failed to create request issuer"),
                })?;
            workers.push(Worker::new(worker_id, parallelism, issuer));
        }

        info!(
            "Started benchmark with {} workers for {} seconds",
            parallelism,
            duration.as_secs_f64()
        );

        let start = Instant::now();
        let deadline = start + duration;

        let mut join_set = JoinSet::new();
        let mut task_ids = HashMap::with_capacity(parallelism);
        for worker in workers {
            let worker_id = worker.id();
            let prompt = Arc::clone(&self.prompt);
            let request_timeout = self.request_timeout;
            let handle = join_set
                .spawn(async move { worker.run(&prompt, request_timeout, deadline).await });
            task_ids.insert(handle.id(), worker_id);
        }

        let mut slots: Vec<Option<WorkerResult>> = (0..parallelism).map(|_| None).collect();
        while let Some(joined) = join_set.join_next_with_id().await {
            let outcome = match joined {
                Ok((_, outcome)) => outcome,
                Err(join_error) => {
                    let worker_id = task_ids.get(&join_error.id()).copied().unwrap_or(0);
                    error!("Worker {} terminated abnormally: {}", worker_id, join_error);
                    Err(BenchmarkError::WorkerPanicked {
                        worker_id,
                        parallelism,
                    })
                }
            };

            match outcome {
                Ok(result) => {
                    debug!(
                        "Worker {} joined with {} requests",
                        result.worker_id(),
                        result.num_of_requests()
                    );
                    let index = result.worker_id() - 1;
                    slots[index] = Some(result);
                }
                Err(e) => {
                    error!("Aborting phase at parallelism {}: {}", parallelism, e);
                    join_set.abort_all();
                    // Drain so aborted tasks are gone before the next phase starts.
                    while join_set.join_next().await.is_some() {}
                    return Err(e);
                }
            }
        }

        let wall_time = start.elapsed();
        info!("Total time: {:.3} seconds", wall_time.as_secs_f64());

        let results = slots.into_iter().flatten().collect();
        Ok(PhaseOutcome { results, wall_time })
    }
}
