//! Integration tests for cadence-core scheduling.
//!
//! Covers the reference scenarios end to end (solver, builder, cache, replay),
//! hierarchical use of boundary rates, and scheduling from several threads.

use std::sync::Arc;

use cadence_core::{
    ActorId, Capacity, CapacityPolicy, Channel, DataflowGraph, ErrorKind, ExternalRateSink,
    PortId, RateOverrides, Scheduler, SchedulerConfig, StructuralReason, replay,
};

/// Two actors joined by one channel with the given rates.
fn pair(produce: u32, consume: u32) -> (DataflowGraph, ActorId, ActorId) {
    let mut graph = DataflowGraph::new("pair");
    let p = graph.add_actor("p");
    let c = graph.add_actor("c");
    let out = graph.add_output(p, "out").unwrap();
    let input = graph.add_input(c, "in").unwrap();
    graph.set_rate(out, produce).unwrap();
    graph.set_rate(input, consume).unwrap();
    graph.connect(out, input).unwrap();
    (graph, p, c)
}

fn entries(result: &cadence_core::ScheduleResult) -> Vec<(ActorId, u64)> {
    result
        .schedule
        .iter()
        .map(|f| (f.actor, f.count))
        .collect()
}

// ============================================================================
// 1. Reference scenarios
// ============================================================================

#[test]
fn producer_feeds_consumer_at_half_rate() {
    let (mut graph, p, c) = pair(1, 2);
    let result = Scheduler::default().schedule(&mut graph).unwrap();

    assert_eq!(result.repetitions.get(p), 2);
    assert_eq!(result.repetitions.get(c), 1);
    assert_eq!(entries(&result), vec![(p, 2), (c, 1)]);
}

#[test]
fn feedback_loop_runs_on_initial_token() {
    let mut graph = DataflowGraph::new("loop");
    let a = graph.add_actor("a");
    let b = graph.add_actor("b");
    let a_out = graph.add_output(a, "out").unwrap();
    let a_in = graph.add_input(a, "in").unwrap();
    let b_in = graph.add_input(b, "in").unwrap();
    let b_out = graph.add_output(b, "out").unwrap();
    graph.connect(a_out, b_in).unwrap();
    graph.connect(b_out, a_in).unwrap();
    graph.set_init_rate(b_out, 1).unwrap();

    let result = Scheduler::default().schedule(&mut graph).unwrap();
    assert_eq!(result.repetitions.get(a), 1);
    assert_eq!(result.repetitions.get(b), 1);
    assert_eq!(result.schedule.firings_of(a), 1);
    assert_eq!(result.schedule.firings_of(b), 1);
    assert_eq!(entries(&result)[0], (a, 1));

    // Without the seeded token neither actor can start.
    graph.set_init_rate(b_out, 0).unwrap();
    let err = Scheduler::default().schedule(&mut graph).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Deadlock);
}

#[test]
fn disconnected_actors_are_rejected_by_default() {
    let mut graph = DataflowGraph::new("islands");
    graph.add_actor("left");
    graph.add_actor("right");

    let err = Scheduler::default().schedule(&mut graph).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Structural);
    assert_eq!(err.structural_reason(), Some(StructuralReason::Disconnected));
    assert!(err.actors().iter().any(|a| a == "left"));
    assert!(err.actors().iter().any(|a| a == "right"));
    assert!(err.to_string().contains("unreached"));
}

#[test]
fn disconnected_actors_scheduled_when_allowed() {
    let mut graph = DataflowGraph::new("islands");
    let left = graph.add_actor("left");
    let right = graph.add_actor("right");

    let scheduler = Scheduler::new(SchedulerConfig {
        allow_disconnected: true,
        ..SchedulerConfig::default()
    });
    let result = scheduler.schedule(&mut graph).unwrap();
    assert_eq!(result.repetitions.get(left), 1);
    assert_eq!(result.repetitions.get(right), 1);
}

#[test]
fn bounded_channel_refuses_fifth_put() {
    let mut channel = Channel::new(Capacity::Bounded(4));
    for token in ["a", "b", "c", "d"] {
        assert!(channel.put(token));
    }
    assert!(!channel.put("e"));
    let drained: Vec<_> = (0..4).map(|_| channel.take().unwrap()).collect();
    assert_eq!(drained, vec!["a", "b", "c", "d"]);
}

#[test]
fn zero_rate_port_never_blocks() {
    let mut graph = DataflowGraph::new("gate");
    let gate = graph.add_actor("gate");
    let control = graph.add_actor("control");
    let data = graph.add_actor("data");
    let control_out = graph.add_output(control, "out").unwrap();
    let data_out = graph.add_output(data, "out").unwrap();
    let gate_control = graph.add_input(gate, "control").unwrap();
    let gate_data = graph.add_input(gate, "data").unwrap();
    graph.set_rate(gate_control, 0).unwrap();
    graph.set_rate(gate_data, 2).unwrap();
    graph.connect(control_out, gate_control).unwrap();
    graph.connect(data_out, gate_data).unwrap();

    let result = Scheduler::default().schedule(&mut graph).unwrap();
    assert_eq!(result.repetitions.get(gate), 1);
    assert_eq!(result.repetitions.get(data), 2);
    assert_eq!(result.repetitions.get(control), 0);
    assert!(replay(&graph, &graph, &result, CapacityPolicy::Unbounded).is_ok());
}

// ============================================================================
// 2. Multirate chains and buffer sizing
// ============================================================================

/// Multirate conversion chain, `(produce, consume)` per edge.
fn conversion_chain() -> (DataflowGraph, Vec<ActorId>) {
    let mut graph = DataflowGraph::new("cd-to-dat");
    let edges = [(1, 3), (2, 7), (4, 7), (5, 4)];
    let actors: Vec<ActorId> = ["cd", "s1", "s2", "s3", "dat"]
        .iter()
        .map(|name| graph.add_actor(*name))
        .collect();
    for (i, &(produce, consume)) in edges.iter().enumerate() {
        let out = graph.add_output(actors[i], "out").unwrap();
        let input = graph.add_input(actors[i + 1], "in").unwrap();
        graph.set_rate(out, produce).unwrap();
        graph.set_rate(input, consume).unwrap();
        graph.connect(out, input).unwrap();
    }
    (graph, actors)
}

#[test]
fn conversion_chain_repetitions() {
    let (mut graph, actors) = conversion_chain();
    let result = Scheduler::default().schedule(&mut graph).unwrap();
    let reps: Vec<u64> = actors.iter().map(|&a| result.repetitions.get(a)).collect();
    assert_eq!(reps, vec![147, 49, 14, 8, 10]);
    assert_eq!(result.schedule.total_firings(), 228);
    assert!(replay(&graph, &graph, &result, CapacityPolicy::Unbounded).is_ok());
}

#[test]
fn constrained_buffers_survive_replay() {
    let (mut graph, _) = conversion_chain();
    let scheduler = Scheduler::new(SchedulerConfig {
        constrain_buffer_sizes: true,
        ..SchedulerConfig::default()
    });
    let result = scheduler.schedule(&mut graph).unwrap();
    for channel in graph.channels() {
        assert_eq!(
            graph.channel_capacity(channel),
            result.buffer_sizes.get(&channel).copied()
        );
    }
    let report = replay(&graph, &graph, &result, CapacityPolicy::Constrained).unwrap();
    for (channel, peak) in &report.peak_occupancy {
        assert!(*peak <= result.buffer_sizes[channel]);
    }
}

// ============================================================================
// 3. Boundary ports and hierarchy
// ============================================================================

#[derive(Default)]
struct Container {
    ports: Vec<(PortId, u64)>,
}

impl ExternalRateSink for Container {
    fn apply_external_rates(&mut self, rates: &cadence_core::ExternalRates) {
        self.ports = rates
            .iter()
            .map(|(p, r)| (p, r.tokens_per_iteration))
            .collect();
    }
}

#[test]
fn inner_graph_exports_boundary_rates() {
    let mut inner = DataflowGraph::new("decimator");
    let ext_in = inner.add_boundary_input("in").unwrap();
    let ext_out = inner.add_boundary_output("out").unwrap();
    let filter = inner.add_actor("filter");
    let f_in = inner.add_input(filter, "in").unwrap();
    let f_out = inner.add_output(filter, "out").unwrap();
    inner.set_rate(f_in, 4).unwrap();
    inner.connect(ext_in, f_in).unwrap();
    inner.connect(f_out, ext_out).unwrap();

    let scheduler = Scheduler::default();
    let mut container = Container::default();
    let result = scheduler.schedule_with(&inner, &inner, &mut container).unwrap();
    assert_eq!(container.ports, vec![(ext_in, 4), (ext_out, 1)]);
    assert!(replay(&inner, &inner, &result, CapacityPolicy::Unbounded).is_ok());

    // The recorded rates make the inner graph usable as one actor outside.
    let recorded = scheduler.schedule(&mut inner).unwrap();
    assert!(Arc::ptr_eq(&result, &recorded));
    assert_eq!(inner.boundary_rate(ext_in).unwrap().tokens_per_iteration, 4);

    let mut outer = DataflowGraph::new("outer");
    let src = outer.add_actor("src");
    let sub = outer.add_actor("decimator");
    let src_out = outer.add_output(src, "out").unwrap();
    let sub_in = outer.add_input(sub, "in").unwrap();
    let rate = inner.boundary_rate(ext_in).unwrap().tokens_per_iteration as u32;
    outer.set_rate(sub_in, rate).unwrap();
    outer.connect(src_out, sub_in).unwrap();
    let outer_result = Scheduler::default().schedule(&mut outer).unwrap();
    assert_eq!(outer_result.repetitions.get(src), 4);
    assert_eq!(outer_result.repetitions.get(sub), 1);
}

#[test]
fn conflicting_boundary_rates_are_inconsistent() {
    let mut graph = DataflowGraph::new("split");
    let ext_in = graph.add_boundary_input("in").unwrap();
    let a = graph.add_actor("a");
    let b = graph.add_actor("b");
    let a_in = graph.add_input(a, "in").unwrap();
    let b_in = graph.add_input(b, "in").unwrap();
    let a_out = graph.add_output(a, "out").unwrap();
    let b_in2 = graph.add_input(b, "in2").unwrap();
    graph.set_rate(b_in, 2).unwrap();
    graph.connect(ext_in, a_in).unwrap();
    graph.connect(ext_in, b_in).unwrap();
    graph.connect(a_out, b_in2).unwrap();

    let err = Scheduler::default().schedule(&mut graph).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RateInconsistency);
}

// ============================================================================
// 4. Cache behavior
// ============================================================================

#[test]
fn overrides_share_the_cache_by_signature() {
    let (graph, p, c) = pair(1, 2);
    let out = graph.find_port(p, "out").unwrap();
    let scheduler = Scheduler::new(SchedulerConfig {
        cache_capacity: Some(2),
        ..SchedulerConfig::default()
    });

    for rate in 1..=4 {
        let rates = RateOverrides::new(&graph).with_rate(out, rate);
        let result = scheduler.schedule_with(&graph, &rates, &mut ()).unwrap();
        let p_reps = result.repetitions.get(p);
        let c_reps = result.repetitions.get(c);
        assert_eq!(p_reps * u64::from(rate), c_reps * 2);
        assert!(scheduler.cached_len() <= 2);
    }

    let again = RateOverrides::new(&graph).with_rate(out, 4);
    let hit = scheduler.schedule_with(&graph, &again, &mut ()).unwrap();
    assert_eq!(hit.repetitions.get(p), 1);
    assert_eq!(hit.repetitions.get(c), 2);
}

// ============================================================================
// 5. Concurrency
// ============================================================================

#[test]
fn independent_graphs_schedule_concurrently() {
    let scheduler = Arc::new(Scheduler::new(SchedulerConfig {
        cache_capacity: None,
        ..SchedulerConfig::default()
    }));
    let handles: Vec<_> = (1..=4u32)
        .map(|consume| {
            let scheduler = Arc::clone(&scheduler);
            std::thread::spawn(move || {
                let (mut graph, p, c) = pair(1, consume);
                let result = scheduler.schedule(&mut graph).unwrap();
                (result.repetitions.get(p), result.repetitions.get(c), consume)
            })
        })
        .collect();
    for handle in handles {
        let (p, c, consume) = handle.join().unwrap();
        assert_eq!(p, u64::from(consume));
        assert_eq!(c, 1);
    }
}
