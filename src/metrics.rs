//! # Throughput Metrics
//!
//! Per-request samples, per-worker derived statistics and the per-phase
//! reduction into a [`RunSummary`].
//!
//! Derived statistics of a [`WorkerResult`] are computed exactly once when the
//! result is sealed and are read-only afterwards. A worker that recorded no
//! requests reports zero for every rate and average; the aggregator leaves such
//! workers out of the `avg_tps` mean and rejects a phase in which every worker
//! came back empty.

use crate::error::{BenchmarkError, BenchmarkResult};
use anyhow::Result;
use hdrhistogram::Histogram;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One successful request/response cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RequestSample {
    pub latency_seconds: f64,
    pub output_tokens: u64,
    pub input_tokens: u64,
}

impl RequestSample {
    pub fn new(latency: Duration, output_tokens: u64, input_tokens: u64) -> Self {
        Self {
            latency_seconds: latency.as_secs_f64(),
            output_tokens,
            input_tokens,
        }
    }
}

/// Statistics derived from one worker's samples.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WorkerStats {
    pub total_time: f64,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub num_of_requests: usize,
    pub avg_request_time: f64,
    /// Output tokens per second of request time
    pub tps: f64,
    pub input_tokens_per_min: f64,
    pub output_tokens_per_min: f64,
}

impl WorkerStats {
    fn compute(req_times: &[f64], input_tokens: &[u64], output_tokens: &[u64]) -> Self {
        let num_of_requests = req_times.len();
        if num_of_requests == 0 {
            return Self::default();
        }

        let total_time: f64 = req_times.iter().sum();
        let total_input_tokens: u64 = input_tokens.iter().sum();
        let total_output_tokens: u64 = output_tokens.iter().sum();

        let (tps, input_tokens_per_min, output_tokens_per_min) = if total_time > 0.0 {
            (
                total_output_tokens as f64 / total_time,
                total_input_tokens as f64 / total_time * 60.0,
                total_output_tokens as f64 / total_time * 60.0,
            )
        } else {
            (0.0, 0.0, 0.0)
        };

        Self {
            total_time,
            total_input_tokens,
            total_output_tokens,
            num_of_requests,
            avg_request_time: total_time / num_of_requests as f64,
            tps,
            input_tokens_per_min,
            output_tokens_per_min,
        }
    }
}

/// Samples collected by exactly one worker over one phase.
///
/// The three sample sequences are kept parallel and chronological. Once built
/// the result is immutable, so the derived [`WorkerStats`] never go stale.
#[derive(Debug, Clone)]
pub struct WorkerResult {
    worker_id: usize,
    req_times: Vec<f64>,
    input_tokens: Vec<u64>,
    output_tokens: Vec<u64>,
    stats: WorkerStats,
}

impl WorkerResult {
    /// Seal a worker's samples and compute its statistics.
    pub fn from_samples(worker_id: usize, samples: Vec<RequestSample>) -> Self {
        let mut req_times = Vec::with_capacity(samples.len());
        let mut input_tokens = Vec::with_capacity(samples.len());
        let mut output_tokens = Vec::with_capacity(samples.len());
        for sample in samples {
            req_times.push(sample.latency_seconds);
            input_tokens.push(sample.input_tokens);
            output_tokens.push(sample.output_tokens);
        }

        let stats = WorkerStats::compute(&req_times, &input_tokens, &output_tokens);
        Self {
            worker_id,
            req_times,
            input_tokens,
            output_tokens,
            stats,
        }
    }

    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    pub fn req_times(&self) -> &[f64] {
        &self.req_times
    }

    pub fn input_tokens(&self) -> &[u64] {
        &self.input_tokens
    }

    pub fn output_tokens(&self) -> &[u64] {
        &self.output_tokens
    }

    pub fn stats(&self) -> &WorkerStats {
        &self.stats
    }

    pub fn is_empty(&self) -> bool {
        self.req_times.is_empty()
    }

    pub fn num_of_requests(&self) -> usize {
        self.stats.num_of_requests
    }

    pub fn total_time(&self) -> f64 {
        self.stats.total_time
    }

    pub fn tps(&self) -> f64 {
        self.stats.tps
    }
}

/// Aggregated outcome of one phase. Field names are the on-disk JSON keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub benchmark_name: String,
    /// Wall-clock duration of the phase in seconds
    pub benchmark_time: f64,
    pub parallelism: usize,
    pub avg_tps: f64,
    pub total_tps: f64,
    pub total_requests: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub input_tokens_min: f64,
    pub output_tokens_min: f64,
}

/// Reduce the per-worker results of one phase into a [`RunSummary`].
///
/// ## Reduction Rules
///
/// - `avg_tps`: arithmetic mean of per-worker `tps` over the workers that
///   recorded at least one request (not weighted by request count)
/// - `total_tps`, totals and per-minute figures: plain sums over all workers
///   (sum of rates, not rate of sums)
///
/// ## Errors
///
/// `BenchmarkError::EmptyResult` if `results` is empty or no worker recorded
/// a request.
pub fn aggregate(
    benchmark_name: &str,
    results: &[WorkerResult],
    wall_time: Duration,
) -> BenchmarkResult<RunSummary> {
    let parallelism = results.len();
    let active: Vec<&WorkerStats> = results
        .iter()
        .filter(|r| !r.is_empty())
        .map(|r| r.stats())
        .collect();

    if active.is_empty() {
        return Err(BenchmarkError::EmptyResult { parallelism });
    }

    let total_tps: f64 = results.iter().map(|r| r.stats.tps).sum();
    let avg_tps = active.iter().map(|s| s.tps).sum::<f64>() / active.len() as f64;

    Ok(RunSummary {
        benchmark_name: benchmark_name.to_string(),
        benchmark_time: wall_time.as_secs_f64(),
        parallelism,
        avg_tps,
        total_tps,
        total_requests: results.iter().map(|r| r.stats.num_of_requests).sum(),
        total_input_tokens: results.iter().map(|r| r.stats.total_input_tokens).sum(),
        total_output_tokens: results.iter().map(|r| r.stats.total_output_tokens).sum(),
        input_tokens_min: results.iter().map(|r| r.stats.input_tokens_per_min).sum(),
        output_tokens_min: results.iter().map(|r| r.stats.output_tokens_per_min).sum(),
    })
}

/// Request latency distribution of one phase, in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyProfile {
    pub samples: u64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub mean_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
}

impl LatencyProfile {
    /// Build a profile over every sample of every worker.
    ///
    /// Latencies are recorded into an HDR histogram at microsecond resolution
    /// with 3 significant figures. Returns `None` when the phase has no samples.
    pub fn from_results(results: &[WorkerResult]) -> Result<Option<Self>> {
        let mut histogram = Histogram::<u64>::new(3)?;
        for latency in results.iter().flat_map(|r| r.req_times()) {
            let micros = (latency * 1_000_000.0).round().max(0.0) as u64;
            histogram.record(micros)?;
        }

        if histogram.len() == 0 {
            return Ok(None);
        }

        let to_ms = |micros: u64| micros as f64 / 1_000.0;
        Ok(Some(Self {
            samples: histogram.len(),
            min_ms: to_ms(histogram.min()),
            max_ms: to_ms(histogram.max()),
            mean_ms: histogram.mean() / 1_000.0,
            p50_ms: to_ms(histogram.value_at_percentile(50.0)),
            p95_ms: to_ms(histogram.value_at_percentile(95.0)),
            p99_ms: to_ms(histogram.value_at_percentile(99.0)),
        }))
    }
}
