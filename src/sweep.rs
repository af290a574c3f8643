//! # Parallelism Sweep
//!
//! Drives one phase per parallelism level, ascending from the lower bound, and
//! stops at the first level whose average per-worker throughput falls below
//! the configured floor. Phases never overlap: the stop decision for level `i`
//! is taken before level `i + 1` starts.
//!
//! ## Sweep Lifecycle
//!
//! 1. **Prepare**: the sink creates the benchmark's output directory
//! 2. **Phase**: the pool runs `i` workers for the configured duration
//! 3. **Aggregate**: per-worker results become a [`RunSummary`]
//! 4. **Emit**: the summary is logged and handed to the sink
//! 5. **Decide**: stop if `avg_tps < min_tps`, otherwise continue with `i + 1`
//!
//! A failed phase unwinds the whole sweep. Nothing is emitted for the failed
//! phase or any later level.

use crate::config::{BenchmarkSpec, BenchmarkSpecDisplay, Prompt};
use crate::error::{BenchmarkError, BenchmarkResult};
use crate::issuer::IssuerFactory;
use crate::metrics::{aggregate, LatencyProfile, RunSummary};
use crate::pool::WorkerPool;
use crate::results::ResultSink;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::sync::Arc;
use tracing::{info, warn};

/// Inclusive parallelism bounds and the throughput floor of a sweep.
///
/// Deserialization goes through [`SweepRange::new`], so a stored range is
/// validated the same way as one built from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SweepRangeFields")]
pub struct SweepRange {
    min_parallelism: usize,
    max_parallelism: usize,
    min_tps: f64,
}

impl SweepRange {
    pub fn new(
        min_parallelism: usize,
        max_parallelism: usize,
        min_tps: f64,
    ) -> BenchmarkResult<Self> {
        if min_parallelism == 0 {
            return Err(BenchmarkError::Configuration(
                "min_workers must be at least 1".to_string(),
            ));
        }
        if min_parallelism > max_parallelism {
            return Err(BenchmarkError::Configuration(format!(
                "min_workers ({}) must not exceed max_workers ({})",
                min_parallelism, max_parallelism
            )));
        }
        if !min_tps.is_finite() || min_tps < 0.0 {
            return Err(BenchmarkError::Configuration(format!(
                "min_tps must be a non-negative number, got {}",
                min_tps
            )));
        }
        Ok(Self {
            min_parallelism,
            max_parallelism,
            min_tps,
        })
    }

    pub fn min_parallelism(&self) -> usize {
        self.min_parallelism
    }

    pub fn max_parallelism(&self) -> usize {
        self.max_parallelism
    }

    pub fn min_tps(&self) -> f64 {
        self.min_tps
    }

    pub fn levels(&self) -> RangeInclusive<usize> {
        self.min_parallelism..=self.max_parallelism
    }
}

#[derive(Deserialize)]
struct SweepRangeFields {
    min_parallelism: usize,
    max_parallelism: usize,
    min_tps: f64,
}

impl TryFrom<SweepRangeFields> for SweepRange {
    type Error = BenchmarkError;

    fn try_from(fields: SweepRangeFields) -> BenchmarkResult<Self> {
        Self::new(fields.min_parallelism, fields.max_parallelism, fields.min_tps)
    }
}

/// One completed phase: the emitted summary plus its latency distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseRecord {
    pub summary: RunSummary,
    pub latency: Option<LatencyProfile>,
}

/// Why a sweep ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum StopReason {
    /// Every level up to `max_parallelism` ran.
    Completed,
    /// The phase at `parallelism` fell below the throughput floor.
    ThroughputBelowFloor {
        parallelism: usize,
        avg_tps: f64,
        min_tps: f64,
    },
}

/// Everything a finished sweep produced, in ascending parallelism order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepReport {
    pub benchmark_name: String,
    pub range: SweepRange,
    pub phases: Vec<PhaseRecord>,
    pub stop_reason: StopReason,
}

impl SweepReport {
    /// Phase with the highest aggregate throughput.
    pub fn peak(&self) -> Option<&PhaseRecord> {
        self.phases.iter().max_by(|a, b| {
            a.summary
                .total_tps
                .total_cmp(&b.summary.total_tps)
                // Prefer the lower level on ties.
                .then_with(|| b.summary.parallelism.cmp(&a.summary.parallelism))
        })
    }

    pub fn summaries(&self) -> impl Iterator<Item = &RunSummary> {
        self.phases.iter().map(|p| &p.summary)
    }
}

/// Adaptive parallelism sweep over one benchmark.
pub struct SweepController {
    spec: BenchmarkSpec,
    pool: WorkerPool,
}

impl SweepController {
    /// ## Parameters
    /// - `spec`: the benchmark to run, shared read-only by every worker
    /// - `prompt`: chat messages sent with every request
    /// - `factory`: builds one request issuer per worker
    pub fn new(spec: BenchmarkSpec, prompt: Prompt, factory: Arc<dyn IssuerFactory>) -> Self {
        let pool = WorkerPool::new(factory, Arc::new(prompt), spec.timeout());
        Self { spec, pool }
    }

    pub fn spec(&self) -> &BenchmarkSpec {
        &self.spec
    }

    /// Run one phase at `parallelism` and emit its summary to `sink`.
    pub async fn run_phase(
        &self,
        parallelism: usize,
        sink: &mut dyn ResultSink,
    ) -> BenchmarkResult<PhaseRecord> {
        sink.prepare(&self.spec.name).map_err(BenchmarkError::Sink)?;

        let outcome = self.pool.run(parallelism, self.spec.run_duration()).await?;
        let summary = aggregate(&self.spec.name, &outcome.results, outcome.wall_time)?;

        let empty_workers = outcome.results.iter().filter(|r| r.is_empty()).count();
        if empty_workers > 0 {
            warn!(
                "{} of {} workers completed no requests and were left out of avg_tps",
                empty_workers, parallelism
            );
        }

        let latency = match LatencyProfile::from_results(&outcome.results) {
            Ok(profile) => profile,
            Err(e) => {
                warn!("Could not build latency profile: {:#}", e);
                None
            }
        };

        let json = serde_json::to_string_pretty(&summary)
            .map_err(|e| BenchmarkError::Sink(e.into()))?;
        info!("Summary:\n{}", json);
        if let Some(latency) = &latency {
            info!(
                "Latency: p50 {:.1}ms, p95 {:.1}ms, p99 {:.1}ms over {} requests",
                latency.p50_ms, latency.p95_ms, latency.p99_ms, latency.samples
            );
        }

        let record = PhaseRecord { summary, latency };
        sink.record(&record).map_err(BenchmarkError::Sink)?;
        Ok(record)
    }

    /// Sweep `range`, one phase per level, until the range is exhausted or
    /// throughput drops below `range.min_tps()`.
    ///
    /// ## Returns
    /// - `Ok(SweepReport)`: every phase that ran, and why the sweep ended
    /// - `Err(BenchmarkError)`: the first phase failure; earlier phases have
    ///   already been emitted to the sink
    pub async fn sweep(
        &self,
        range: &SweepRange,
        sink: &mut dyn ResultSink,
    ) -> BenchmarkResult<SweepReport> {
        info!("Using the following benchmark config:\n{}", BenchmarkSpecDisplay(&self.spec));
        info!(
            "Sweeping parallelism {}..={} with throughput floor {} tokens/s",
            range.min_parallelism(),
            range.max_parallelism(),
            range.min_tps()
        );

        let mut phases = Vec::new();
        let mut stop_reason = StopReason::Completed;

        for parallelism in range.levels() {
            info!("Running benchmark with PARALLELISM={}", parallelism);
            let record = self.run_phase(parallelism, sink).await?;
            let avg_tps = record.summary.avg_tps;
            phases.push(record);

            if avg_tps < range.min_tps() {
                warn!(
                    "TPS is too low ({:.2} < {:.2}), stopping...",
                    avg_tps,
                    range.min_tps()
                );
                stop_reason = StopReason::ThroughputBelowFloor {
                    parallelism,
                    avg_tps,
                    min_tps: range.min_tps(),
                };
                break;
            }
        }

        let report = SweepReport {
            benchmark_name: self.spec.name.clone(),
            range: *range,
            phases,
            stop_reason,
        };
        sink.finalize(&report).map_err(BenchmarkError::Sink)?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChatMessage;
    use crate::issuer::{CompletionOutcome, RequestIssuer};
    use crate::metrics::RequestSample;
    use crate::results::MemorySink;
    use async_trait::async_trait;
    use std::io;
    use std::sync::Mutex;
    use std::time::Duration;

    struct SteadyIssuer;

    #[async_trait]
    impl RequestIssuer for SteadyIssuer {
        async fn complete(
            &mut self,
            _prompt: &Prompt,
            _timeout: Duration,
        ) -> anyhow::Result<CompletionOutcome> {
            let latency = Duration::from_millis(100);
            tokio::time::sleep(latency).await;
            Ok(CompletionOutcome {
                sample: RequestSample::new(latency, 20, 5),
                content: None,
            })
        }

        fn name(&self) -> &'static str {
            "steady"
        }
    }

    struct SteadyFactory;

    impl IssuerFactory for SteadyFactory {
        fn create(
            &self,
            _worker_id: usize,
            _parallelism: usize,
        ) -> anyhow::Result<Box<dyn RequestIssuer>> {
            Ok(Box::new(SteadyIssuer))
        }
    }

    /// Collects formatted log output in memory.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).to_string()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn record(parallelism: usize, total_tps: f64) -> PhaseRecord {
        PhaseRecord {
            summary: RunSummary {
                benchmark_name: "b".to_string(),
                benchmark_time: 1.0,
                parallelism,
                avg_tps: total_tps / parallelism as f64,
                total_tps,
                total_requests: 1,
                total_input_tokens: 1,
                total_output_tokens: 1,
                input_tokens_min: 1.0,
                output_tokens_min: 1.0,
            },
            latency: None,
        }
    }

    #[test]
    fn test_sweep_range_validation() {
        let range = SweepRange::new(1, 25, 12.0).unwrap();
        assert_eq!(range.levels().count(), 25);
        assert_eq!(SweepRange::new(3, 3, 0.0).unwrap().levels().count(), 1);

        assert!(SweepRange::new(0, 5, 1.0).is_err());
        assert!(SweepRange::new(6, 5, 1.0).is_err());
        assert!(SweepRange::new(1, 5, -1.0).is_err());
        assert!(SweepRange::new(1, 5, f64::NAN).is_err());
    }

    #[test]
    fn test_peak_prefers_highest_total_tps() {
        let report = SweepReport {
            benchmark_name: "b".to_string(),
            range: SweepRange::new(1, 3, 0.0).unwrap(),
            phases: vec![record(1, 100.0), record(2, 180.0), record(3, 180.0)],
            stop_reason: StopReason::Completed,
        };
        assert_eq!(report.peak().unwrap().summary.parallelism, 2);
        assert_eq!(report.summaries().count(), 3);
    }

    #[test]
    fn test_stop_reason_serialization() {
        let reason = StopReason::ThroughputBelowFloor {
            parallelism: 4,
            avg_tps: 10.0,
            min_tps: 12.0,
        };
        let value = serde_json::to_value(&reason).unwrap();
        assert_eq!(value["reason"], "throughput_below_floor");
        assert_eq!(value["parallelism"], 4);
    }

    #[test]
    fn test_sweep_range_deserialization_is_validated() {
        let range: SweepRange =
            serde_json::from_str(r#"{"min_parallelism":2,"max_parallelism":4,"min_tps":12.0}"#)
                .unwrap();
        assert_eq!(range, SweepRange::new(2, 4, 12.0).unwrap());

        let zero = r#"{"min_parallelism":0,"max_parallelism":0,"min_tps":-5.0}"#;
        assert!(serde_json::from_str::<SweepRange>(zero).is_err());
        let inverted = r#"{"min_parallelism":5,"max_parallelism":2,"min_tps":1.0}"#;
        assert!(serde_json::from_str::<SweepRange>(inverted).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_phase_logs_summary_for_any_sink() {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let mut spec = BenchmarkSpec::new("logged", "k", "m");
        spec.benchmark_time_sec = 1;
        let prompt = Prompt::new(vec![ChatMessage::new("user", "hi")]);
        let controller = SweepController::new(spec, prompt, Arc::new(SteadyFactory));
        let mut sink = MemorySink::new();

        let record = controller.run_phase(1, &mut sink).await.unwrap();

        assert_eq!(sink.parallelism_levels(), vec![1]);
        assert_eq!(record.summary.total_requests, 10);
        let output = logs.contents();
        assert!(output.contains("Summary:"), "logs: {}", output);
        assert!(output.contains("\"benchmark_name\": \"logged\""));
        assert!(output.contains("Latency: p50"));
    }
}
