//! Replay command: schedule a graph, then run one iteration on real channels.

use cadence_core::{CapacityPolicy, Scheduler, replay};
use clap::Args;
use serde::Serialize;

use super::common::{GraphSource, SchedulerFlags, build_graph, print_json};

#[derive(Args)]
pub struct ReplayArgs {
    #[command(flatten)]
    source: GraphSource,

    #[command(flatten)]
    flags: SchedulerFlags,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct ReplayOutput {
    graph: String,
    policy: CapacityPolicy,
    firings: u64,
    tokens_moved: u64,
    peak_occupancy: Vec<(String, u64)>,
}

pub fn run(args: ReplayArgs) -> anyhow::Result<()> {
    let mut built = build_graph(&args.source, &args.flags)?;
    let scheduler = Scheduler::new(built.config.clone());
    let result = scheduler.schedule(&mut built.graph)?;

    let policy = if built.config.constrain_buffer_sizes {
        CapacityPolicy::Constrained
    } else {
        CapacityPolicy::Unbounded
    };
    let graph = &built.graph;
    let report = replay(graph, graph, &result, policy)?;

    let output = ReplayOutput {
        graph: graph.name().to_string(),
        policy,
        firings: report.firings,
        tokens_moved: report.tokens_moved,
        peak_occupancy: report
            .peak_occupancy
            .iter()
            .map(|(&ch, &peak)| (graph.channel_name(ch).unwrap_or("?").to_string(), peak))
            .collect(),
    };

    if args.json {
        return print_json(&output);
    }

    println!("Replayed '{}' ({:?} channels)", output.graph, output.policy);
    println!("  firings:      {}", output.firings);
    println!("  tokens moved: {}", output.tokens_moved);
    println!();
    println!("Peak occupancy:");
    for (channel, peak) in &output.peak_occupancy {
        println!("  {:<20} {}", channel, peak);
    }
    Ok(())
}
