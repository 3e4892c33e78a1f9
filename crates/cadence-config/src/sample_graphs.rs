//! Sample graphs bundled with the cadence library.
//!
//! These graphs are always available without external files. Each one shows
//! a scheduling shape worth knowing: multirate chains, feedback with delay,
//! zero-rate control ports, fan-out, and boundary ports.

use crate::GraphDescription;

/// Array of sample graph names for external access.
pub static SAMPLE_GRAPH_NAMES: &[&str] = &[
    "producer-consumer",
    "feedback-loop",
    "cd-to-dat",
    "zero-rate-gate",
    "fan-out",
    "boundary-pipeline",
];

/// TOML content for sample graphs.
///
/// These are embedded at compile time and always available.
static SAMPLE_GRAPHS_TOML: &[(&str, &str)] = &[
    ("producer-consumer", PRODUCER_CONSUMER),
    ("feedback-loop", FEEDBACK_LOOP),
    ("cd-to-dat", CD_TO_DAT),
    ("zero-rate-gate", ZERO_RATE_GATE),
    ("fan-out", FAN_OUT),
    ("boundary-pipeline", BOUNDARY_PIPELINE),
];

/// One producer feeding a consumer that takes two tokens per firing.
const PRODUCER_CONSUMER: &str = r#"
name = "producer-consumer"
description = "Producer at rate 1 feeding a consumer at rate 2"

[[actors]]
name = "p"
[[actors.ports]]
name = "out"
direction = "output"
rate = 1

[[actors]]
name = "c"
[[actors.ports]]
name = "in"
direction = "input"
rate = 2

[[connections]]
from = "p.out"
to = ["c.in"]
"#;

/// Two actors in a loop, started by one initial token.
const FEEDBACK_LOOP: &str = r#"
name = "feedback-loop"
description = "a -> b -> a with one initial token on the feedback edge"

[[actors]]
name = "a"
[[actors.ports]]
name = "in"
direction = "input"
[[actors.ports]]
name = "out"
direction = "output"

[[actors]]
name = "b"
[[actors.ports]]
name = "in"
direction = "input"
[[actors.ports]]
name = "out"
direction = "output"
init_rate = 1

[[connections]]
from = "a.out"
to = ["b.in"]

[[connections]]
from = "b.out"
to = ["a.in"]
name = "feedback"
"#;

/// Sample-rate conversion from 44.1 kHz to 48 kHz in four stages.
const CD_TO_DAT: &str = r#"
name = "cd-to-dat"
description = "44.1 kHz to 48 kHz conversion chain"

[scheduler]
constrain_buffer_sizes = true

[[actors]]
name = "cd"
[[actors.ports]]
name = "out"
direction = "output"
rate = 1

[[actors]]
name = "fir1"
[[actors.ports]]
name = "in"
direction = "input"
rate = 1
[[actors.ports]]
name = "out"
direction = "output"
rate = 2

[[actors]]
name = "fir2"
[[actors.ports]]
name = "in"
direction = "input"
rate = 3
[[actors.ports]]
name = "out"
direction = "output"
rate = 2

[[actors]]
name = "fir3"
[[actors.ports]]
name = "in"
direction = "input"
rate = 7
[[actors.ports]]
name = "out"
direction = "output"
rate = 8

[[actors]]
name = "fir4"
[[actors.ports]]
name = "in"
direction = "input"
rate = 7
[[actors.ports]]
name = "out"
direction = "output"
rate = 5

[[actors]]
name = "dat"
[[actors.ports]]
name = "in"
direction = "input"
rate = 1

[[connections]]
from = "cd.out"
to = ["fir1.in"]

[[connections]]
from = "fir1.out"
to = ["fir2.in"]

[[connections]]
from = "fir2.out"
to = ["fir3.in"]

[[connections]]
from = "fir3.out"
to = ["fir4.in"]

[[connections]]
from = "fir4.out"
to = ["dat.in"]
"#;

/// A gate whose control input never blocks.
const ZERO_RATE_GATE: &str = r#"
name = "zero-rate-gate"
description = "Gate with a rate-0 control input and a rate-2 data input"

[[actors]]
name = "gate"
[[actors.ports]]
name = "control"
direction = "input"
rate = 0
[[actors.ports]]
name = "data"
direction = "input"
rate = 2

[[actors]]
name = "control"
[[actors.ports]]
name = "out"
direction = "output"

[[actors]]
name = "data"
[[actors.ports]]
name = "out"
direction = "output"

[[connections]]
from = "control.out"
to = ["gate.control"]

[[connections]]
from = "data.out"
to = ["gate.data"]
"#;

/// One output feeding two consumers through a shared channel.
const FAN_OUT: &str = r#"
name = "fan-out"
description = "One source broadcast to consumers at rates 1 and 2"

[[actors]]
name = "src"
[[actors.ports]]
name = "out"
direction = "output"

[[actors]]
name = "fast"
[[actors.ports]]
name = "in"
direction = "input"
rate = 1

[[actors]]
name = "slow"
[[actors.ports]]
name = "in"
direction = "input"
rate = 2

[[connections]]
from = "src.out"
to = ["fast.in", "slow.in"]
name = "broadcast"
"#;

/// A subgraph whose boundary rates are inferred for its container.
const BOUNDARY_PIPELINE: &str = r#"
name = "boundary-pipeline"
description = "Decimate by 4 then gain, between boundary ports"

[[boundary]]
name = "in"
direction = "input"

[[boundary]]
name = "out"
direction = "output"

[[actors]]
name = "decimate"
[[actors.ports]]
name = "in"
direction = "input"
rate = 4
[[actors.ports]]
name = "out"
direction = "output"

[[actors]]
name = "gain"
[[actors.ports]]
name = "in"
direction = "input"
[[actors.ports]]
name = "out"
direction = "output"

[[connections]]
from = "in"
to = ["decimate.in"]

[[connections]]
from = "decimate.out"
to = ["gain.in"]

[[connections]]
from = "gain.out"
to = ["out"]
"#;

/// Get all sample graphs.
///
/// # Example
///
/// ```rust
/// use cadence_config::sample_graphs;
///
/// for graph in sample_graphs() {
///     println!("{}: {} actors", graph.name, graph.len());
/// }
/// ```
pub fn sample_graphs() -> Vec<GraphDescription> {
    SAMPLE_GRAPHS_TOML
        .iter()
        .filter_map(|(_, toml)| GraphDescription::from_toml(toml).ok())
        .collect()
}

/// Get a sample graph by name.
///
/// The name match is case-insensitive.
///
/// # Example
///
/// ```rust
/// use cadence_config::get_sample_graph;
///
/// let graph = get_sample_graph("feedback-loop").unwrap();
/// assert_eq!(graph.len(), 2);
/// ```
pub fn get_sample_graph(name: &str) -> Option<GraphDescription> {
    SAMPLE_GRAPHS_TOML
        .iter()
        .find(|(sample, _)| sample.eq_ignore_ascii_case(name))
        .and_then(|(_, toml)| GraphDescription::from_toml(toml).ok())
}

/// Get the list of sample graph names.
pub fn sample_graph_names() -> Vec<&'static str> {
    SAMPLE_GRAPHS_TOML.iter().map(|(name, _)| *name).collect()
}

/// Check if a name is a sample graph (case-insensitive).
pub fn is_sample_graph(name: &str) -> bool {
    SAMPLE_GRAPH_NAMES
        .iter()
        .any(|sample| sample.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::{CapacityPolicy, Scheduler, replay};

    fn schedule(name: &str) -> (crate::BuiltGraph, std::sync::Arc<cadence_core::ScheduleResult>) {
        let mut built = get_sample_graph(name).unwrap().build().unwrap();
        let result = Scheduler::new(built.config.clone())
            .schedule(&mut built.graph)
            .unwrap();
        (built, result)
    }

    fn reps(built: &crate::BuiltGraph, result: &cadence_core::ScheduleResult, actor: &str) -> u64 {
        result.repetitions.get(built.actor(actor).unwrap())
    }

    #[test]
    fn test_sample_graphs_load() {
        let graphs = sample_graphs();
        assert_eq!(graphs.len(), SAMPLE_GRAPH_NAMES.len());
        for (graph, name) in graphs.iter().zip(SAMPLE_GRAPH_NAMES) {
            assert_eq!(graph.name, *name);
            assert!(graph.validate().is_ok(), "{name} should validate");
        }
    }

    #[test]
    fn test_names_match_table() {
        assert_eq!(sample_graph_names(), SAMPLE_GRAPH_NAMES.to_vec());
    }

    #[test]
    fn test_get_case_insensitive() {
        assert!(get_sample_graph("FAN-OUT").is_some());
        assert!(get_sample_graph("nonexistent").is_none());
        assert!(is_sample_graph("Cd-To-Dat"));
        assert!(!is_sample_graph("nonexistent"));
    }

    #[test]
    fn test_every_sample_schedules_and_replays() {
        for name in SAMPLE_GRAPH_NAMES {
            let (built, result) = schedule(name);
            let policy = if built.config.constrain_buffer_sizes {
                CapacityPolicy::Constrained
            } else {
                CapacityPolicy::Unbounded
            };
            assert!(
                replay(&built.graph, &built.graph, &result, policy).is_ok(),
                "{name} should replay"
            );
        }
    }

    #[test]
    fn test_producer_consumer() {
        let (built, result) = schedule("producer-consumer");
        assert_eq!(result.schedule.display(&built.graph).to_string(), "(p, 2) (c, 1)");
    }

    #[test]
    fn test_cd_to_dat_repetitions() {
        let (built, result) = schedule("cd-to-dat");
        let counts: Vec<u64> = ["cd", "fir1", "fir2", "fir3", "fir4", "dat"]
            .iter()
            .map(|a| reps(&built, &result, a))
            .collect();
        assert_eq!(counts, vec![147, 147, 98, 28, 32, 160]);
    }

    #[test]
    fn test_zero_rate_gate() {
        let (built, result) = schedule("zero-rate-gate");
        assert_eq!(reps(&built, &result, "gate"), 1);
        assert_eq!(reps(&built, &result, "data"), 2);
        assert_eq!(reps(&built, &result, "control"), 0);
    }

    #[test]
    fn test_fan_out() {
        let (built, result) = schedule("fan-out");
        assert_eq!(reps(&built, &result, "src"), 2);
        assert_eq!(reps(&built, &result, "fast"), 2);
        assert_eq!(reps(&built, &result, "slow"), 1);
    }

    #[test]
    fn test_boundary_pipeline_rates() {
        let (built, result) = schedule("boundary-pipeline");
        let rate = |name: &str| {
            result
                .external_rates
                .get(built.port(name).unwrap())
                .unwrap()
                .tokens_per_iteration
        };
        assert_eq!(rate("in"), 4);
        assert_eq!(rate("out"), 1);
        assert_eq!(
            built.graph.boundary_rate(built.port("in").unwrap()).unwrap().tokens_per_iteration,
            4
        );
    }
}
