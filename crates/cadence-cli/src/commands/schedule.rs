//! Schedule command: compute and print a graph's schedule.

use cadence_core::Scheduler;
use clap::Args;

use super::common::{GraphSource, ScheduleReport, SchedulerFlags, build_graph, print_json};

#[derive(Args)]
pub struct ScheduleArgs {
    #[command(flatten)]
    source: GraphSource,

    #[command(flatten)]
    flags: SchedulerFlags,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

pub fn run(args: ScheduleArgs) -> anyhow::Result<()> {
    let mut built = build_graph(&args.source, &args.flags)?;
    let scheduler = Scheduler::new(built.config.clone());
    let result = scheduler.schedule(&mut built.graph)?;

    let report = ScheduleReport::new(&built.graph, &result);
    if args.json {
        print_json(&report)
    } else {
        report.print();
        Ok(())
    }
}
