//! Schedule types produced by the scheduler.
//!
//! A [`ScheduleResult`] is an immutable snapshot shared through `Arc`. The
//! cache hands out the same snapshot on every hit, so consumers never see a
//! partially built result.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::graph::{ActorId, ChannelId, DataflowGraph};
use crate::rate::{ExternalRates, RateSignature};

/// One schedule entry: fire `actor` `count` times in a row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Firing {
    /// Actor to fire.
    pub actor: ActorId,
    /// Consecutive firings.
    pub count: u64,
}

/// Ordered list of firings for one iteration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    firings: Vec<Firing>,
}

impl Schedule {
    /// Creates an empty schedule.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, actor: ActorId, count: u64) {
        self.firings.push(Firing { actor, count });
    }

    /// Number of entries (not firings).
    pub fn len(&self) -> usize {
        self.firings.len()
    }

    /// Returns true when nothing fires.
    pub fn is_empty(&self) -> bool {
        self.firings.is_empty()
    }

    /// Iterates over the entries in order.
    pub fn iter(&self) -> impl Iterator<Item = &Firing> + '_ {
        self.firings.iter()
    }

    /// Entries as a slice.
    pub fn as_slice(&self) -> &[Firing] {
        &self.firings
    }

    /// Total firings of one actor across all entries.
    pub fn firings_of(&self, actor: ActorId) -> u64 {
        self.firings
            .iter()
            .filter(|f| f.actor == actor)
            .map(|f| f.count)
            .sum()
    }

    /// Total firings of all actors.
    pub fn total_firings(&self) -> u64 {
        self.firings.iter().map(|f| f.count).sum()
    }

    /// One actor per firing, in order.
    pub fn expand(&self) -> Vec<ActorId> {
        self.firings
            .iter()
            .flat_map(|f| std::iter::repeat_n(f.actor, f.count as usize))
            .collect()
    }

    /// Formats the schedule with actor names, e.g. `(p, 2) (c, 1)`.
    pub fn display<'a>(&'a self, graph: &'a DataflowGraph) -> ScheduleDisplay<'a> {
        ScheduleDisplay {
            schedule: self,
            graph,
        }
    }
}

impl<'a> IntoIterator for &'a Schedule {
    type Item = &'a Firing;
    type IntoIter = std::slice::Iter<'a, Firing>;

    fn into_iter(self) -> Self::IntoIter {
        self.firings.iter()
    }
}

/// Name-resolving formatter returned by [`Schedule::display`].
pub struct ScheduleDisplay<'a> {
    schedule: &'a Schedule,
    graph: &'a DataflowGraph,
}

impl fmt::Display for ScheduleDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, firing) in self.schedule.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(
                f,
                "({}, {})",
                self.graph.actor_label(firing.actor),
                firing.count
            )?;
        }
        Ok(())
    }
}

/// Firings per iteration for every scheduled actor.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepetitionVector(BTreeMap<ActorId, u64>);

impl RepetitionVector {
    /// Creates an empty vector.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, actor: ActorId, count: u64) {
        self.0.insert(actor, count);
    }

    /// Firings of one actor, or 0 if it is not in the vector.
    pub fn get(&self, actor: ActorId) -> u64 {
        self.0.get(&actor).copied().unwrap_or(0)
    }

    /// Number of actors.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true when no actors were scheduled.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates in actor order.
    pub fn iter(&self) -> impl Iterator<Item = (ActorId, u64)> + '_ {
        self.0.iter().map(|(&a, &n)| (a, n))
    }

    /// Sum of all firings.
    pub fn total(&self) -> u64 {
        self.0.values().sum()
    }
}

/// Everything one scheduling pass produces.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleResult {
    /// Ordered firings.
    pub schedule: Schedule,
    /// Firings per actor per iteration.
    pub repetitions: RepetitionVector,
    /// Tokens each boundary port moves per iteration.
    pub external_rates: ExternalRates,
    /// Highest token count seen on each channel while building.
    pub buffer_sizes: BTreeMap<ChannelId, u64>,
    /// Rate signature the result was computed for.
    pub signature: RateSignature,
}
