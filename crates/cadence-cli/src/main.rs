//! Cadence CLI - Command-line interface for the cadence dataflow scheduler.

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cadence")]
#[command(author, version, about = "Cadence dataflow scheduler CLI", long_about = None)]
struct Cli {
    /// Log scheduler decisions at debug level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute and print the schedule of a graph
    Schedule(commands::schedule::ScheduleArgs),

    /// Check whether a graph can be scheduled
    Check(commands::check::CheckArgs),

    /// Schedule a graph, then execute one iteration on real channels
    Replay(commands::replay::ReplayArgs),

    /// List built-in sample graphs or print one as TOML
    Samples(commands::samples::SamplesArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Schedule(args) => commands::schedule::run(args),
        Commands::Check(args) => commands::check::run(args),
        Commands::Replay(args) => commands::replay::run(args),
        Commands::Samples(args) => commands::samples::run(args),
    }
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback.into()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}
