//! # Results Management
//!
//! Sinks that receive each completed phase and the final sweep report. The
//! JSON manager lays files out as `<root>/<benchmark>/res_<parallelism>.json`
//! plus one `sweep.json` with run metadata once the sweep finishes.

use crate::sweep::{PhaseRecord, SweepReport};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

/// Destination for per-phase summaries and the final sweep report.
pub trait ResultSink: Send {
    /// Make sure the benchmark's output location exists. Called before every
    /// phase; must be idempotent.
    fn prepare(&mut self, benchmark_name: &str) -> Result<()>;

    /// Persist one completed phase.
    fn record(&mut self, phase: &PhaseRecord) -> Result<()>;

    /// Called once after the last phase of a successful sweep.
    fn finalize(&mut self, report: &SweepReport) -> Result<()>;
}

/// System information for reproducibility
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    pub os: String,
    pub architecture: String,
    pub cpu_cores: usize,
    pub benchmark_version: String,
}

impl Default for SystemInfo {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            architecture: std::env::consts::ARCH.to_string(),
            cpu_cores: num_cpus::get(),
            benchmark_version: crate::VERSION.to_string(),
        }
    }
}

/// Sweep metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepMetadata {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub system_info: SystemInfo,
}

/// Contents of `sweep.json`
#[derive(Debug, Serialize, Deserialize)]
pub struct FinalSweepResults {
    pub metadata: SweepMetadata,
    pub report: SweepReport,
    /// Parallelism level with the highest total throughput
    pub peak_parallelism: Option<usize>,
}

/// Writes `<root>/<benchmark>/res_<parallelism>.json` for every phase and
/// `<root>/<benchmark>/sweep.json` when the sweep finishes.
pub struct JsonResultsManager {
    output_root: PathBuf,
    run_id: Uuid,
    started_at: DateTime<Utc>,
    written: Vec<PathBuf>,
}

impl JsonResultsManager {
    /// Create a new results manager rooted at `output_root`
    pub fn new<P: AsRef<Path>>(output_root: P) -> Self {
        Self {
            output_root: output_root.as_ref().to_path_buf(),
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            written: Vec::new(),
        }
    }

    pub fn benchmark_dir(&self, benchmark_name: &str) -> PathBuf {
        self.output_root.join(benchmark_name)
    }

    /// Path of the summary file for one phase
    pub fn phase_path(&self, benchmark_name: &str, parallelism: usize) -> PathBuf {
        self.benchmark_dir(benchmark_name)
            .join(format!("res_{}.json", parallelism))
    }

    pub fn report_path(&self, benchmark_name: &str) -> PathBuf {
        self.benchmark_dir(benchmark_name).join("sweep.json")
    }

    /// Files written so far, in write order
    pub fn written_files(&self) -> &[PathBuf] {
        &self.written
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }
}

impl ResultSink for JsonResultsManager {
    fn prepare(&mut self, benchmark_name: &str) -> Result<()> {
        let dir = self.benchmark_dir(benchmark_name);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create output directory {}", dir.display()))?;
        debug!("Output directory ready: {:?}", dir);
        Ok(())
    }

    fn record(&mut self, phase: &PhaseRecord) -> Result<()> {
        let summary = &phase.summary;
        let path = self.phase_path(&summary.benchmark_name, summary.parallelism);

        let json = serde_json::to_string_pretty(summary)?;
        std::fs::write(&path, &json)
            .with_context(|| format!("failed to write {}", path.display()))?;

        debug!("Wrote {:?}", path);
        self.written.push(path);
        Ok(())
    }

    fn finalize(&mut self, report: &SweepReport) -> Result<()> {
        info!("Finalizing sweep results");

        let final_results = FinalSweepResults {
            metadata: SweepMetadata {
                run_id: self.run_id.to_string(),
                started_at: self.started_at,
                finished_at: Utc::now(),
                system_info: SystemInfo::default(),
            },
            report: report.clone(),
            peak_parallelism: report.peak().map(|p| p.summary.parallelism),
        };

        let path = self.report_path(&report.benchmark_name);
        self.prepare(&report.benchmark_name)?;
        let json = serde_json::to_string_pretty(&final_results)?;
        std::fs::write(&path, json)
            .with_context(|| format!("failed to write {}", path.display()))?;

        info!("Results written to: {:?}", path);
        self.written.push(path);
        Ok(())
    }
}

/// Keeps everything in memory; useful for embedding and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub prepared: Vec<String>,
    pub phases: Vec<PhaseRecord>,
    pub report: Option<SweepReport>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parallelism_levels(&self) -> Vec<usize> {
        self.phases.iter().map(|p| p.summary.parallelism).collect()
    }
}

impl ResultSink for MemorySink {
    fn prepare(&mut self, benchmark_name: &str) -> Result<()> {
        self.prepared.push(benchmark_name.to_string());
        Ok(())
    }

    fn record(&mut self, phase: &PhaseRecord) -> Result<()> {
        self.phases.push(phase.clone());
        Ok(())
    }

    fn finalize(&mut self, report: &SweepReport) -> Result<()> {
        self.report = Some(report.clone());
        Ok(())
    }
}
