//! Schedule replay against real channels.
//!
//! [`replay`] executes a [`ScheduleResult`] the way a runtime would: one
//! [`Channel`] per consumer endpoint, sequence-numbered tokens, every firing
//! taking and putting its declared counts. It confirms that no firing takes
//! from an empty channel and that every actor fires exactly as often as the
//! repetition vector says. Under [`CapacityPolicy::Constrained`] each channel
//! is bounded by its inferred size, so overrunning it surfaces as a
//! [`ScheduleError::CapacityViolation`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::builder::{gating_inputs, initial_tokens};
use crate::channel::{Capacity, Channel};
use crate::error::ScheduleError;
use crate::graph::{ChannelId, DataflowGraph, PortId};
use crate::rate::RateProvider;
use crate::schedule::ScheduleResult;

/// How channel capacities are enforced during replay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapacityPolicy {
    /// Channels grow as needed.
    #[default]
    Unbounded,
    /// Channels are bounded by the result's buffer sizes.
    Constrained,
}

/// A token moved during replay.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Token {
    /// Channel the token was produced into. `None` for initial tokens on an
    /// unlinked input.
    pub channel: Option<ChannelId>,
    /// Position in the channel's production order, starting at 0.
    pub sequence: u64,
}

/// Summary of a successful replay.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayReport {
    /// Total actor firings executed.
    pub firings: u64,
    /// Tokens produced by firings, counted once per consumer endpoint.
    pub tokens_moved: u64,
    /// Largest number of tokens held at any one endpoint of each channel.
    pub peak_occupancy: BTreeMap<ChannelId, u64>,
}

struct Replay<'a, R: ?Sized> {
    graph: &'a DataflowGraph,
    rates: &'a R,
    result: &'a ScheduleResult,
    /// One channel per port; only consumer endpoints receive tokens.
    endpoints: Vec<Channel<Token>>,
    next_sequence: BTreeMap<ChannelId, u64>,
    report: ReplayReport,
}

/// Replays one iteration of `result` on `graph`.
pub fn replay<R: RateProvider + ?Sized>(
    graph: &DataflowGraph,
    rates: &R,
    result: &ScheduleResult,
    policy: CapacityPolicy,
) -> Result<ReplayReport, ScheduleError> {
    let mut run = Replay {
        graph,
        rates,
        result,
        endpoints: graph
            .ports()
            .map(|p| Channel::new(endpoint_capacity(graph, result, policy, p)))
            .collect(),
        next_sequence: BTreeMap::new(),
        report: ReplayReport {
            peak_occupancy: graph.channels().map(|c| (c, 0)).collect(),
            ..ReplayReport::default()
        },
    };
    run.seed()?;
    run.execute()?;
    run.check_counts()?;

    #[cfg(feature = "tracing")]
    tracing::debug!(
        "replay_done: {} firings, {} tokens",
        run.report.firings,
        run.report.tokens_moved
    );
    Ok(run.report)
}

fn endpoint_capacity(
    graph: &DataflowGraph,
    result: &ScheduleResult,
    policy: CapacityPolicy,
    port: PortId,
) -> Capacity {
    match (policy, graph.port_channel(port)) {
        (CapacityPolicy::Constrained, Some(channel)) => result
            .buffer_sizes
            .get(&channel)
            .map_or(Capacity::Unbounded, |&size| Capacity::Bounded(size as usize)),
        _ => Capacity::Unbounded,
    }
}

impl<R: RateProvider + ?Sized> Replay<'_, R> {
    fn seed(&mut self) -> Result<(), ScheduleError> {
        let seeds = initial_tokens(self.graph, self.rates, Some(&self.result.external_rates));
        for (endpoint, count) in seeds {
            let channel = self.graph.port_channel(endpoint);
            let tokens = self.mint(channel, count);
            self.deliver(endpoint, channel, tokens)?;
        }
        Ok(())
    }

    fn execute(&mut self) -> Result<(), ScheduleError> {
        let (graph, rates, result) = (self.graph, self.rates, self.result);
        for firing in result.schedule.iter() {
            for _ in 0..firing.count {
                for port in gating_inputs(graph, firing.actor) {
                    let rate = rates.consumption_rate(port) as usize;
                    if self.endpoints[port.index() as usize].take_batch(rate).is_err() {
                        return Err(ScheduleError::ReplayUnderflow {
                            actor: graph.actor_label(firing.actor),
                            port: graph.port_full_name(port),
                            channel: self.channel_label(graph.port_channel(port)),
                        });
                    }
                }
                for port in graph.outputs(firing.actor) {
                    let Some(channel) = graph.port_channel(port) else {
                        continue;
                    };
                    let rate = u64::from(rates.production_rate(port));
                    let tokens = self.mint(Some(channel), rate);
                    for consumer in graph.consumers(channel) {
                        self.deliver(consumer, Some(channel), tokens.clone())?;
                        self.report.tokens_moved += rate;
                    }
                }
                self.report.firings += 1;
            }
        }
        Ok(())
    }

    fn check_counts(&self) -> Result<(), ScheduleError> {
        for (actor, expected) in self.result.repetitions.iter() {
            let fired = self.result.schedule.firings_of(actor);
            if fired != expected {
                let name = self.graph.actor_label(actor);
                return Err(ScheduleError::RateInconsistency {
                    message: format!("actor '{name}' fired {fired} times, expected {expected}"),
                    actors: vec![name],
                    ports: Vec::new(),
                });
            }
        }
        Ok(())
    }

    /// Creates `count` tokens numbered in the channel's production order.
    fn mint(&mut self, channel: Option<ChannelId>, count: u64) -> Vec<Token> {
        let start = channel.map_or(0, |c| {
            let next = self.next_sequence.entry(c).or_insert(0);
            let start = *next;
            *next += count;
            start
        });
        (start..start + count)
            .map(|sequence| Token { channel, sequence })
            .collect()
    }

    fn deliver(
        &mut self,
        endpoint: PortId,
        channel: Option<ChannelId>,
        tokens: Vec<Token>,
    ) -> Result<(), ScheduleError> {
        let queue = &mut self.endpoints[endpoint.index() as usize];
        if !queue.put_batch(tokens) {
            let capacity = match queue.capacity() {
                Capacity::Bounded(n) => n as u64,
                Capacity::Unbounded => u64::MAX,
            };
            return Err(ScheduleError::CapacityViolation {
                channel: self.channel_label(channel),
                capacity,
            });
        }
        if let Some(channel) = channel {
            let held = queue.len() as u64;
            let peak = self.report.peak_occupancy.entry(channel).or_insert(0);
            *peak = (*peak).max(held);
        }
        Ok(())
    }

    fn channel_label(&self, channel: Option<ChannelId>) -> String {
        channel
            .and_then(|c| self.graph.channel_name(c))
            .unwrap_or("<unlinked>")
            .to_string()
    }
}
