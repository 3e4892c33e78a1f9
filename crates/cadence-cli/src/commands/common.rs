//! Shared CLI helpers used across multiple commands.

use std::collections::BTreeMap;
use std::path::PathBuf;

use cadence_config::{BuiltGraph, GraphDescription, get_sample_graph};
use cadence_core::{
    DataflowGraph, ErrorKind, ScheduleError, ScheduleResult, StructuralReason,
};
use clap::Args;
use serde::Serialize;

/// Where the graph comes from.
#[derive(Args)]
pub struct GraphSource {
    /// Graph description file (TOML)
    #[arg(required_unless_present = "sample", conflicts_with = "sample")]
    pub file: Option<PathBuf>,

    /// Use a built-in sample graph instead of a file
    #[arg(long)]
    pub sample: Option<String>,
}

/// Scheduler switches that override the description's `[scheduler]` table.
#[derive(Args)]
pub struct SchedulerFlags {
    /// Fix channel capacities to the high-water marks of the schedule
    #[arg(long)]
    pub constrain_buffers: bool,

    /// Schedule disconnected clusters independently
    #[arg(long)]
    pub allow_disconnected: bool,
}

/// Load a description from a file or the sample set.
pub fn load_description(source: &GraphSource) -> anyhow::Result<GraphDescription> {
    if let Some(name) = &source.sample {
        let description = get_sample_graph(name).ok_or_else(|| {
            anyhow::anyhow!(
                "Sample graph '{}' not found. Use 'cadence samples' to see available samples.",
                name
            )
        })?;
        tracing::debug!("loaded sample graph '{}'", description.name);
        return Ok(description);
    }
    match &source.file {
        Some(path) => {
            let description =
                GraphDescription::load(path).map_err(|e| anyhow::anyhow!("{}", e))?;
            tracing::debug!(
                "loaded graph '{}' from {}",
                description.name,
                path.display()
            );
            Ok(description)
        }
        None => anyhow::bail!("no graph given: pass a file or --sample NAME"),
    }
}

/// Load and build a graph, applying command-line overrides to its settings.
pub fn build_graph(source: &GraphSource, flags: &SchedulerFlags) -> anyhow::Result<BuiltGraph> {
    let description = load_description(source)?;
    let mut built = description
        .build()
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    built.config.constrain_buffer_sizes |= flags.constrain_buffers;
    built.config.allow_disconnected |= flags.allow_disconnected;
    tracing::debug!(
        "built '{}': {} actors, {} channels, {:?}",
        built.graph.name(),
        built.graph.actor_count(),
        built.graph.channel_count(),
        built.config
    );
    Ok(built)
}

/// A schedule result keyed by names instead of IDs.
#[derive(Serialize)]
pub struct ScheduleReport {
    pub graph: String,
    pub signature: String,
    pub repetitions: BTreeMap<String, u64>,
    pub schedule: Vec<(String, u64)>,
    pub buffer_sizes: BTreeMap<String, u64>,
    pub boundary_rates: BTreeMap<String, u64>,
}

impl ScheduleReport {
    pub fn new(graph: &DataflowGraph, result: &ScheduleResult) -> Self {
        let actor = |id| graph.actor_name(id).unwrap_or("?").to_string();
        Self {
            graph: graph.name().to_string(),
            signature: result.signature.to_string(),
            repetitions: result
                .repetitions
                .iter()
                .map(|(id, count)| (actor(id), count))
                .collect(),
            schedule: result
                .schedule
                .iter()
                .map(|f| (actor(f.actor), f.count))
                .collect(),
            buffer_sizes: result
                .buffer_sizes
                .iter()
                .map(|(&ch, &size)| (graph.channel_name(ch).unwrap_or("?").to_string(), size))
                .collect(),
            boundary_rates: result
                .external_rates
                .iter()
                .map(|(port, rate)| (graph.port_full_name(port), rate.tokens_per_iteration))
                .collect(),
        }
    }

    pub fn print(&self) {
        println!("Graph: {}", self.graph);
        println!();
        println!("Repetitions:");
        for (actor, count) in &self.repetitions {
            println!("  {:<20} {}", actor, count);
        }
        println!();
        let entries: Vec<String> = self
            .schedule
            .iter()
            .map(|(actor, count)| format!("({actor}, {count})"))
            .collect();
        println!("Schedule: {}", entries.join(" "));
        println!();
        println!("Buffer sizes:");
        for (channel, size) in &self.buffer_sizes {
            println!("  {:<20} {}", channel, size);
        }
        if !self.boundary_rates.is_empty() {
            println!();
            println!("Boundary rates (tokens per iteration):");
            for (port, rate) in &self.boundary_rates {
                println!("  {:<20} {}", port, rate);
            }
        }
    }
}

/// A scheduling failure in printable form.
#[derive(Serialize)]
pub struct ErrorReport {
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
    pub message: String,
    pub actors: Vec<String>,
    pub ports: Vec<String>,
}

impl ErrorReport {
    pub fn new(err: &ScheduleError) -> Self {
        Self {
            kind: kind_label(err.kind()),
            reason: err.structural_reason().map(reason_label),
            message: err.to_string(),
            actors: err.actors().to_vec(),
            ports: err.ports().to_vec(),
        }
    }

    pub fn print(&self) {
        match self.reason {
            Some(reason) => println!("{} ({}): {}", self.kind, reason, self.message),
            None => println!("{}: {}", self.kind, self.message),
        }
        if !self.actors.is_empty() {
            println!("  actors: {}", self.actors.join(", "));
        }
        if !self.ports.is_empty() {
            println!("  ports:  {}", self.ports.join(", "));
        }
    }
}

fn kind_label(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Structural => "structural",
        ErrorKind::RateInconsistency => "rate-inconsistency",
        ErrorKind::Deadlock => "deadlock",
        ErrorKind::CapacityViolation => "capacity-violation",
        ErrorKind::ReplayUnderflow => "replay-underflow",
    }
}

fn reason_label(reason: StructuralReason) -> &'static str {
    match reason {
        StructuralReason::Disconnected => "disconnected",
        StructuralReason::NonDeterministicMerge => "non-deterministic-merge",
        StructuralReason::BidirectionalPort => "bidirectional-port",
        StructuralReason::UndirectedPort => "undirected-port",
    }
}

/// Print a value as pretty JSON.
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
