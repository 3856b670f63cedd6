use std::{io, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tempered_walk::{ChainSettings, Driver, ProblemConfig};
use tracing::info;

/// Serve a tempered random-walk sampler to a controller over stdin/stdout.
///
/// Reads one command per line (`log_potential(beta)` or
/// `call_sampler!(beta)`) and answers each with one `response(...)` line.
/// Logs go to stderr.
#[derive(Parser, Debug)]
#[command(name = "tempered-walk")]
#[command(version)]
#[command(about, long_about = None)]
struct Cli {
    /// Seed of the random number generator
    #[arg(long)]
    seed: u64,

    /// JSON problem file with constraints, bounds, mean, covariance and
    /// starting point. Uses the three dimensional simplex corner when absent.
    #[arg(long, value_name = "PATH")]
    problem: Option<PathBuf>,

    /// Standard deviation of the Gaussian proposal
    #[arg(long, default_value = "0.2")]
    step_size: f64,

    /// Proposals per retained draw
    #[arg(long, default_value = "10")]
    thinning: u64,

    /// Retained draws per call_sampler! command
    #[arg(long, default_value = "1")]
    draws_per_call: u64,

    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: tracing::Level,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let config = match &cli.problem {
        Some(path) => ProblemConfig::from_path(path)
            .with_context(|| format!("Could not load problem from {}", path.display()))?,
        None => ProblemConfig::default(),
    };
    let problem = config.build().context("Invalid problem")?;
    info!(
        seed = cli.seed,
        dim = problem.region.dim(),
        constraints = problem.region.num_constraints(),
        "starting sampler"
    );

    let settings = ChainSettings {
        num_draws: cli.draws_per_call,
        thinning: cli.thinning,
        step_size: cli.step_size,
    };
    let mut driver = Driver::from_problem(problem, cli.seed, settings)?;

    driver
        .serve(io::stdin().lock(), io::stdout().lock())
        .context("Session with the controller ended with an error")
}
