//! Check command: report whether a graph can be scheduled.

use cadence_core::Scheduler;
use clap::Args;
use serde::Serialize;

use super::common::{ErrorReport, GraphSource, SchedulerFlags, build_graph, print_json};

#[derive(Args)]
pub struct CheckArgs {
    #[command(flatten)]
    source: GraphSource,

    #[command(flatten)]
    flags: SchedulerFlags,

    /// Print the outcome as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct CheckOutcome {
    graph: String,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    firings_per_iteration: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorReport>,
}

pub fn run(args: CheckArgs) -> anyhow::Result<()> {
    let mut built = build_graph(&args.source, &args.flags)?;
    let scheduler = Scheduler::new(built.config.clone());
    let graph_name = built.graph.name().to_string();

    let outcome = match scheduler.schedule(&mut built.graph) {
        Ok(result) => CheckOutcome {
            graph: graph_name,
            ok: true,
            firings_per_iteration: Some(result.repetitions.total()),
            error: None,
        },
        Err(err) => CheckOutcome {
            graph: graph_name,
            ok: false,
            firings_per_iteration: None,
            error: Some(ErrorReport::new(&err)),
        },
    };

    if args.json {
        print_json(&outcome)?;
    } else if let Some(error) = &outcome.error {
        println!("{}: not schedulable", outcome.graph);
        error.print();
    } else {
        println!(
            "{}: OK ({} firings per iteration)",
            outcome.graph,
            outcome.firings_per_iteration.unwrap_or(0)
        );
    }

    if outcome.ok {
        Ok(())
    } else {
        anyhow::bail!("graph '{}' cannot be scheduled", outcome.graph)
    }
}
