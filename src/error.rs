//! # Error Taxonomy
//!
//! Typed failures surfaced by the benchmark engine. Boundary code (HTTP,
//! filesystem, YAML) reports through `anyhow::Error` and is wrapped into one
//! of these variants where it crosses into the core, so the sweep can name
//! the failing worker and phase when it unwinds.

use std::time::Duration;
use thiserror::Error;

/// Errors produced while configuring or running a sweep.
#[derive(Debug, Error)]
pub enum BenchmarkError {
    /// Unknown benchmark name, unreadable config/prompt file, or a schema
    /// validation failure. Always raised before any phase runs.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The request issuer reported a failure inside a worker loop.
    #[error("worker {worker_id} failed at parallelism {parallelism}: {source:#}")]
    Request {
        worker_id: usize,
        parallelism: usize,
        #[source]
        source: anyhow::Error,
    },

    /// A single request exceeded the per-request timeout.
    #[error("worker {worker_id} timed out after {timeout:?} at parallelism {parallelism}")]
    Timeout {
        worker_id: usize,
        parallelism: usize,
        timeout: Duration,
    },

    /// Every worker of the phase finished without recording a request.
    #[error("no requests completed by any worker at parallelism {parallelism}")]
    EmptyResult { parallelism: usize },

    /// A worker task terminated abnormally (panic or external cancellation).
    #[error("worker {worker_id} terminated abnormally at parallelism {parallelism}")]
    WorkerPanicked { worker_id: usize, parallelism: usize },

    /// Writing results to the sink failed.
    #[error("failed to persist results: {0:#}")]
    Sink(#[source] anyhow::Error),
}

impl BenchmarkError {
    /// Parallelism level of the phase the error belongs to, if any.
    pub fn parallelism(&self) -> Option<usize> {
        match self {
            BenchmarkError::Request { parallelism, .. }
            | BenchmarkError::Timeout { parallelism, .. }
            | BenchmarkError::EmptyResult { parallelism }
            | BenchmarkError::WorkerPanicked { parallelism, .. } => Some(*parallelism),
            BenchmarkError::Configuration(_) | BenchmarkError::Sink(_) => None,
        }
    }

    /// Identifier of the failing worker, if the error is worker-scoped.
    pub fn worker_id(&self) -> Option<usize> {
        match self {
            BenchmarkError::Request { worker_id, .. }
            | BenchmarkError::Timeout { worker_id, .. }
            | BenchmarkError::WorkerPanicked { worker_id, .. } => Some(*worker_id),
            _ => None,
        }
    }
}

/// Convenience alias used throughout the engine.
pub type BenchmarkResult<T> = std::result::Result<T, BenchmarkError>;
