use crate::error::BenchmarkResult;
use crate::sweep::SweepRange;
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

/// LLM Server Benchmark - adaptive parallelism load testing for chat-completion services
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Also write logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sweep parallelism for one benchmark until throughput drops below the floor
    Run(RunArgs),

    /// List the benchmarks defined in the configuration file
    List(ListArgs),
}

#[derive(ClapArgs, Debug, Clone)]
pub struct RunArgs {
    /// Name of the benchmark to run
    #[arg(short = 'n', long)]
    pub name: String,

    /// Benchmark configuration file (YAML)
    #[arg(short = 'c', long, default_value = crate::defaults::CONFIG_FILE)]
    pub config: PathBuf,

    /// First parallelism level
    #[arg(long, alias = "min_workers", default_value_t = crate::defaults::MIN_WORKERS)]
    pub min_workers: usize,

    /// Last parallelism level (inclusive)
    #[arg(long, alias = "max_workers", default_value_t = crate::defaults::MAX_WORKERS)]
    pub max_workers: usize,

    /// Stop once average per-worker tokens/s falls below this value
    #[arg(long, alias = "min_tps", default_value_t = crate::defaults::MIN_TPS)]
    pub min_tps: f64,

    /// Directory under which `<name>/res_<parallelism>.json` files are written
    #[arg(short = 'o', long, default_value = ".")]
    pub output_dir: PathBuf,
}

impl RunArgs {
    pub fn sweep_range(&self) -> BenchmarkResult<SweepRange> {
        SweepRange::new(self.min_workers, self.max_workers, self.min_tps)
    }
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ListArgs {
    /// Benchmark configuration file (YAML)
    #[arg(short = 'c', long, default_value = crate::defaults::CONFIG_FILE)]
    pub config: PathBuf,
}
