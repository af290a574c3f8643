//! # Worker Loop
//!
//! A worker issues requests back to back until a shared deadline passes and
//! records one [`RequestSample`] per successful call. The loop is bounded by
//! time, not by a request count: the deadline is only checked between
//! requests, so a request already in flight when the deadline passes still
//! completes and is recorded.
//!
//! Any failure aborts the worker immediately. No partial result is returned
//! and nothing is retried.

use crate::config::Prompt;
use crate::error::{BenchmarkError, BenchmarkResult};
use crate::issuer::RequestIssuer;
use crate::metrics::{RequestSample, WorkerResult};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info};

/// The worker whose first response is echoed for manual inspection.
pub const DEBUG_WORKER_ID: usize = 1;

/// One concurrent load generator inside a phase.
pub struct Worker {
    id: usize,
    parallelism: usize,
    issuer: Box<dyn RequestIssuer>,
}

impl Worker {
    /// ## Parameters
    /// - `id`: 1-based worker identifier, used for logging and debug selection
    /// - `parallelism`: level of the phase this worker belongs to
    /// - `issuer`: the worker's own request issuer
    pub fn new(id: usize, parallelism: usize, issuer: Box<dyn RequestIssuer>) -> Self {
        Self {
            id,
            parallelism,
            issuer,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Issue requests until `deadline` and return the collected samples.
    ///
    /// Each call is bounded by `request_timeout`. If the deadline has already
    /// passed on entry, the result is empty.
    pub async fn run(
        mut self,
        prompt: &Prompt,
        request_timeout: Duration,
        deadline: Instant,
    ) -> BenchmarkResult<WorkerResult> {
        info!("Worker {} started", self.id);

        let mut samples: Vec<RequestSample> = Vec::new();
        let mut debug_print = self.id == DEBUG_WORKER_ID;

        while Instant::now() < deadline {
            let call = self.issuer.complete(prompt, request_timeout);
            let outcome = match tokio::time::timeout(request_timeout, call).await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(source)) => {
                    error!("Worker {} failed: {:#}", self.id, source);
                    return Err(BenchmarkError::Request {
                        worker_id: self.id,
                        parallelism: self.parallelism,
                        source,
                    });
                }
                Err(_) => {
                    error!(
                        "Worker {} failed: request exceeded {:?}",
                        self.id, request_timeout
                    );
                    return Err(BenchmarkError::Timeout {
                        worker_id: self.id,
                        parallelism: self.parallelism,
                        timeout: request_timeout,
                    });
                }
            };

            if debug_print {
                info!(
                    "First response from worker {}:\n{}",
                    self.id,
                    outcome.content.as_deref().unwrap_or("<no content>")
                );
                debug_print = false;
            }

            samples.push(outcome.sample);
        }

        debug!(
            "Worker {} finished with {} requests",
            self.id,
            samples.len()
        );
        Ok(WorkerResult::from_samples(self.id, samples))
    }
}
