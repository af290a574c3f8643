//! # LLM Server Benchmark Library
//!
//! A load-testing harness for chat-completion style services. A fixed prompt
//! is issued repeatedly by N concurrent workers for a bounded wall-clock
//! duration; per-request latency and token counts are reduced into throughput
//! figures, and an adaptive sweep raises N level by level until throughput per
//! worker drops below a floor.
//!
//! ## Architecture Overview
//!
//! - `issuer`: the request boundary (`RequestIssuer`, `IssuerFactory`) and the
//!   OpenAI-compatible HTTP implementation
//! - `worker`: the duration-bounded request loop of a single worker
//! - `pool`: runs one phase of N isolated workers with fail-fast cancellation
//! - `metrics`: per-worker statistics and per-phase `RunSummary` aggregation
//! - `sweep`: the parallelism sweep and its stop rule
//! - `results`: result sinks writing `<name>/res_<parallelism>.json`
//! - `config`: YAML benchmark catalogue and prompt loading
//! - `cli`, `logging`, `utils`: command line, tracing setup, formatting
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use llm_server_benchmark::{
//!     BenchmarkRoot, JsonResultsManager, OpenAiIssuerFactory, Prompt, SweepController, SweepRange,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let root = BenchmarkRoot::load("llm_config.yaml")?;
//!     let spec = root.select("local")?.clone();
//!     let prompt = Prompt::load(&spec)?;
//!     let factory = Arc::new(OpenAiIssuerFactory::from_spec(&spec)?);
//!
//!     let controller = SweepController::new(spec, prompt, factory);
//!     let mut sink = JsonResultsManager::new(".");
//!     let report = controller
//!         .sweep(&SweepRange::new(1, 25, 12.0)?, &mut sink)
//!         .await?;
//!
//!     println!("Ran {} phases", report.phases.len());
//!     Ok(())
//! }
//! ```

pub mod cli;

/// YAML benchmark catalogue, validation and prompt loading
pub mod config;

pub mod error;

/// Request boundary towards the service under test
///
/// Each worker owns the issuer it was given, so no connection pool or other
/// mutable state is shared between workers.
pub mod issuer;

pub mod logging;

/// Per-worker statistics and per-phase aggregation
pub mod metrics;

pub mod pool;

/// Result persistence: per-phase JSON files and the final sweep report
pub mod results;

/// Adaptive parallelism sweep
pub mod sweep;

pub mod utils;

pub mod worker;

pub use config::{BenchmarkRoot, BenchmarkSpec, ChatMessage, Prompt};
pub use error::{BenchmarkError, BenchmarkResult};
pub use issuer::{CompletionOutcome, IssuerFactory, OpenAiIssuerFactory, RequestIssuer};
pub use metrics::{aggregate, LatencyProfile, RequestSample, RunSummary, WorkerResult};
pub use pool::{PhaseOutcome, WorkerPool};
pub use results::{JsonResultsManager, MemorySink, ResultSink};
pub use sweep::{PhaseRecord, StopReason, SweepController, SweepRange, SweepReport};
pub use worker::Worker;

/// The current version of the benchmark, recorded in `sweep.json`
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration values
///
/// Passed explicitly into the sweep and config loader; the engine itself
/// never reads them.
pub mod defaults {
    /// Configuration file read when `--config` is not given
    pub const CONFIG_FILE: &str = "llm_config.yaml";

    /// Prompt file used when a benchmark does not set `prompt_path`
    pub const PROMPT_PATH: &str = "prompt.json";

    /// Phase duration in seconds
    pub const BENCHMARK_TIME_SEC: u64 = 30;

    /// Per-request timeout in seconds
    pub const REQUEST_TIMEOUT_SEC: u64 = 30;

    /// First parallelism level of a sweep
    pub const MIN_WORKERS: usize = 1;

    /// Last parallelism level of a sweep
    pub const MAX_WORKERS: usize = 25;

    /// Average per-worker tokens/s below which a sweep stops
    pub const MIN_TPS: f64 = 12.0;
}
