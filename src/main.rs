//! # LLM Server Benchmark - Main Entry Point
//!
//! 1. **Parse arguments** and initialize logging
//! 2. **Load configuration** and select the requested benchmark
//! 3. **Sweep** parallelism levels, writing one summary per phase
//! 4. **Report** the phase table and the peak level
//!
//! Any failure (unknown benchmark, failing worker, unwritable output) ends the
//! process with a non-zero exit code and the full error chain.

use anyhow::{Context, Result};
use clap::Parser;
use llm_server_benchmark::{
    cli::{Args, Command, ListArgs, RunArgs},
    config::{BenchmarkRoot, Prompt},
    issuer::OpenAiIssuerFactory,
    logging::init_logging,
    results::JsonResultsManager,
    sweep::SweepController,
    utils::render_sweep_table,
};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Held until exit so the non-blocking file writer flushes.
    let _log_guard = init_logging(args.verbose, args.log_file.as_deref())?;

    match args.command {
        Command::Run(run_args) => {
            if let Err(e) = run(&run_args).await {
                error!("Benchmark '{}' failed: {:#}", run_args.name, e);
                return Err(e);
            }
            Ok(())
        }
        Command::List(list_args) => list(&list_args),
    }
}

async fn run(args: &RunArgs) -> Result<()> {
    info!("Starting LLM Server Benchmark v{}", llm_server_benchmark::VERSION);

    let range = args.sweep_range()?;
    let root = BenchmarkRoot::load(&args.config)?;
    let spec = root.select(&args.name)?.clone();
    let prompt = Prompt::load(&spec)?;
    let factory = OpenAiIssuerFactory::from_spec(&spec)
        .with_context(|| format!("failed to configure client for '{}'", spec.name))?;
    info!("Target endpoint: {}", factory.endpoint());

    let controller = SweepController::new(spec, prompt, Arc::new(factory));
    let mut results_manager = JsonResultsManager::new(&args.output_dir);

    let report = controller.sweep(&range, &mut results_manager).await?;

    info!("############");
    info!("\n{}", render_sweep_table(&report));
    info!("############");
    Ok(())
}

fn list(args: &ListArgs) -> Result<()> {
    let root = BenchmarkRoot::load(&args.config)?;
    if root.benchmarks.is_empty() {
        info!("No benchmarks defined in {:?}", args.config);
    }
    for spec in &root.benchmarks {
        info!("{} ({})", spec.name, spec.model_id);
    }
    Ok(())
}
