//! Schedule construction by token-flow simulation.
//!
//! [`ScheduleBuilder`] replays one iteration symbolically: it counts the
//! tokens waiting at every consumer endpoint, fires whichever actor is ready,
//! and records each step as a schedule entry. The counters live in a context
//! allocated per call and indexed by port, so independent graphs can be
//! scheduled concurrently and nothing leaks between passes.
//!
//! # Ready list
//!
//! Ready actors sit on a stack. The most recently readied actor fires next,
//! which keeps the schedule depth-first: a producer's output is drained by
//! its consumers before unrelated work resumes. After an actor fires, its
//! downstream actors are pushed first and the actor itself last, so it runs
//! again immediately if it is still ready. Any order yields a valid schedule;
//! this one is kept stable so schedules are reproducible.
//!
//! # Gating
//!
//! An input port gates readiness only when it is linked to a channel that has
//! a producer. A zero-rate input never blocks.

use std::collections::BTreeMap;

use crate::error::ScheduleError;
use crate::graph::{ActorId, ChannelId, DataflowGraph, PortDirection, PortId, PortOwner};
use crate::rate::{ExternalRates, RateProvider};
use crate::schedule::{RepetitionVector, Schedule};

/// Highest token count observed per channel during a simulation.
///
/// With fan-out each consumer endpoint has its own count; the channel's mark
/// is the largest of them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BufferSizeTracker {
    marks: BTreeMap<ChannelId, u64>,
}

impl BufferSizeTracker {
    /// Creates a tracker with every channel of the graph at zero.
    pub fn new(graph: &DataflowGraph) -> Self {
        Self {
            marks: graph.channels().map(|c| (c, 0)).collect(),
        }
    }

    /// Raises the channel's mark to at least `tokens`.
    pub fn observe(&mut self, channel: ChannelId, tokens: u64) {
        let mark = self.marks.entry(channel).or_insert(0);
        *mark = (*mark).max(tokens);
    }

    /// Returns a channel's mark.
    pub fn high_water(&self, channel: ChannelId) -> u64 {
        self.marks.get(&channel).copied().unwrap_or(0)
    }

    /// Consumes the tracker, returning the marks.
    pub fn into_sizes(self) -> BTreeMap<ChannelId, u64> {
        self.marks
    }
}

/// Output of [`ScheduleBuilder::build`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuiltSchedule {
    /// Ordered firings.
    pub schedule: Schedule,
    /// Per-channel high-water marks.
    pub buffer_sizes: BTreeMap<ChannelId, u64>,
}

/// Turns a repetition vector into an ordered schedule.
pub struct ScheduleBuilder<'a, R: ?Sized> {
    graph: &'a DataflowGraph,
    rates: &'a R,
    repetitions: &'a RepetitionVector,
    external_rates: Option<&'a ExternalRates>,
}

/// Per-pass simulation state.
struct Simulation {
    /// Tokens waiting at each consumer endpoint, indexed by port.
    waiting: Vec<u64>,
    /// Firings left per actor, indexed by actor.
    remaining: Vec<u64>,
    /// Actor is on the ready stack.
    queued: Vec<bool>,
    ready: Vec<ActorId>,
    tracker: BufferSizeTracker,
}

impl<'a, R: RateProvider + ?Sized> ScheduleBuilder<'a, R> {
    /// Creates a builder for the given repetition vector.
    pub fn new(graph: &'a DataflowGraph, rates: &'a R, repetitions: &'a RepetitionVector) -> Self {
        Self {
            graph,
            rates,
            repetitions,
            external_rates: None,
        }
    }

    /// Seeds boundary inputs with their per-iteration token counts.
    pub fn with_external_rates(mut self, external_rates: &'a ExternalRates) -> Self {
        self.external_rates = Some(external_rates);
        self
    }

    /// Runs the simulation.
    ///
    /// Fails with [`ScheduleError::Deadlock`] when no actor is ready but some
    /// still have firings remaining.
    pub fn build(&self) -> Result<BuiltSchedule, ScheduleError> {
        let mut sim = Simulation {
            waiting: vec![0; self.graph.port_count()],
            remaining: self
                .graph
                .actors()
                .map(|a| self.repetitions.get(a))
                .collect(),
            queued: vec![false; self.graph.actor_count()],
            ready: Vec::new(),
            tracker: BufferSizeTracker::new(self.graph),
        };

        for (endpoint, tokens) in initial_tokens(self.graph, self.rates, self.external_rates) {
            let slot = &mut sim.waiting[endpoint.index() as usize];
            *slot = slot.saturating_add(tokens);
            if let Some(channel) = self.graph.port_channel(endpoint) {
                sim.tracker.observe(channel, *slot);
            }
        }

        for actor in self.graph.actors() {
            self.enqueue_if_ready(actor, &mut sim);
        }

        let mut schedule = Schedule::new();
        while let Some(actor) = sim.ready.pop() {
            let idx = actor.index() as usize;
            sim.queued[idx] = false;

            let firings = self.max_firings(actor, &sim);
            if firings == 0 {
                continue;
            }
            self.fire(actor, firings, &mut sim);
            sim.remaining[idx] -= firings;
            schedule.push(actor, firings);

            #[cfg(feature = "tracing")]
            tracing::debug!(
                "schedule_fire: '{}' x{firings}, {} left",
                self.graph.actor_label(actor),
                sim.remaining[idx]
            );

            for downstream in self.downstream(actor) {
                self.enqueue_if_ready(downstream, &mut sim);
            }
            self.enqueue_if_ready(actor, &mut sim);
        }

        let stuck: Vec<String> = self
            .graph
            .actors()
            .filter(|a| sim.remaining[a.index() as usize] > 0)
            .map(|a| self.graph.actor_label(a))
            .collect();
        if !stuck.is_empty() {
            return Err(ScheduleError::Deadlock {
                message: format!(
                    "no actor can fire but {} still must: {}; a cycle may need more initial tokens",
                    stuck.len(),
                    stuck.join(", ")
                ),
                actors: stuck,
            });
        }

        Ok(BuiltSchedule {
            schedule,
            buffer_sizes: sim.tracker.into_sizes(),
        })
    }

    fn enqueue_if_ready(&self, actor: ActorId, sim: &mut Simulation) {
        let idx = actor.index() as usize;
        if !sim.queued[idx] && self.max_firings(actor, sim) > 0 {
            sim.queued[idx] = true;
            sim.ready.push(actor);
        }
    }

    /// Consecutive firings possible right now, capped by the firings left.
    fn max_firings(&self, actor: ActorId, sim: &Simulation) -> u64 {
        let mut firings = sim.remaining[actor.index() as usize];
        for port in self.gating_inputs(actor) {
            let rate = u64::from(self.rates.consumption_rate(port));
            if rate > 0 {
                firings = firings.min(sim.waiting[port.index() as usize] / rate);
            }
        }
        firings
    }

    fn fire(&self, actor: ActorId, firings: u64, sim: &mut Simulation) {
        for port in self.gating_inputs(actor) {
            let used = u64::from(self.rates.consumption_rate(port)).saturating_mul(firings);
            let slot = &mut sim.waiting[port.index() as usize];
            *slot = slot.saturating_sub(used);
        }
        for port in self.graph.outputs(actor) {
            let Some(channel) = self.graph.port_channel(port) else {
                continue;
            };
            let produced = u64::from(self.rates.production_rate(port)).saturating_mul(firings);
            if produced == 0 {
                continue;
            }
            for consumer in self.graph.consumers(channel) {
                let slot = &mut sim.waiting[consumer.index() as usize];
                *slot = slot.saturating_add(produced);
                sim.tracker.observe(channel, *slot);
            }
        }
    }

    fn gating_inputs(&self, actor: ActorId) -> impl Iterator<Item = PortId> + '_ {
        gating_inputs(self.graph, actor)
    }

    /// Actors owning a consumer port on any of this actor's output channels.
    fn downstream(&self, actor: ActorId) -> Vec<ActorId> {
        let mut actors = Vec::new();
        for port in self.graph.outputs(actor) {
            let Some(channel) = self.graph.port_channel(port) else {
                continue;
            };
            for consumer in self.graph.consumers(channel) {
                if let Some(PortOwner::Actor(owner)) = self.graph.port_owner(consumer) {
                    if owner != actor && !actors.contains(&owner) {
                        actors.push(owner);
                    }
                }
            }
        }
        actors
    }
}

/// Input ports of `actor` linked to a channel that has a producer.
pub(crate) fn gating_inputs(
    graph: &DataflowGraph,
    actor: ActorId,
) -> impl Iterator<Item = PortId> + '_ {
    graph.inputs(actor).filter(move |&port| {
        graph
            .port_channel(port)
            .is_some_and(|ch| !graph.producers(ch).is_empty())
    })
}

/// Tokens present at each consumer endpoint before the first firing.
///
/// - an actor output's init tokens go to every consumer of its channel
///   (a boundary output downstream starts with them too)
/// - an actor input's init tokens go to that input
/// - a boundary input feeds its consumers its per-iteration rate plus its own
///   init tokens
pub(crate) fn initial_tokens<R: RateProvider + ?Sized>(
    graph: &DataflowGraph,
    rates: &R,
    external_rates: Option<&ExternalRates>,
) -> Vec<(PortId, u64)> {
    let mut seeds = Vec::new();
    for port in graph.ports() {
        let init = u64::from(rates.init_rate(port));
        let channel = graph.port_channel(port);
        match (graph.port_owner(port), graph.port_direction(port)) {
            (Some(PortOwner::Actor(_)), Some(PortDirection::Output)) => {
                if let (Some(channel), true) = (channel, init > 0) {
                    seeds.extend(graph.consumers(channel).into_iter().map(|c| (c, init)));
                }
            }
            (Some(PortOwner::Actor(_)), Some(PortDirection::Input)) => {
                if init > 0 {
                    seeds.push((port, init));
                }
            }
            (Some(PortOwner::Boundary), Some(PortDirection::Input)) => {
                let external = external_rates
                    .and_then(|r| r.get(port))
                    .map_or(0, |r| r.tokens_per_iteration);
                let tokens = external.saturating_add(init);
                if let (Some(channel), true) = (channel, tokens > 0) {
                    seeds.extend(graph.consumers(channel).into_iter().map(|c| (c, tokens)));
                }
            }
            _ => {}
        }
    }
    seeds
}
