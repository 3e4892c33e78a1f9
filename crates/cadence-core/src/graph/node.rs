//! Actor types for the dataflow graph.
//!
//! Each actor has an [`ActorId`] and an ordered list of ports. The
//! `ActorData` struct bundles the name with internal bookkeeping (port lists,
//! the firing count recorded by the last successful schedule).

use serde::{Deserialize, Serialize};

use super::port::PortId;

/// Unique identifier for an actor in a [`DataflowGraph`](super::DataflowGraph).
///
/// Actor IDs are assigned sequentially and never reused within a graph instance.
/// They remain stable across graph mutations and schedule computations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorId(pub(crate) u32);

impl ActorId {
    /// Returns the raw numeric identifier.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

impl core::fmt::Display for ActorId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "ActorId({})", self.0)
    }
}

/// Internal bookkeeping for an actor in the graph.
#[derive(Debug)]
pub(crate) struct ActorData {
    pub name: String,
    /// Ports in declaration order. Inputs and outputs are interleaved as added.
    pub ports: Vec<PortId>,
    /// Firings per iteration recorded by the last successful schedule.
    pub firings_per_iteration: Option<u64>,
}

impl ActorData {
    pub fn new(name: String) -> Self {
        Self {
            name,
            ports: Vec::new(),
            firings_per_iteration: None,
        }
    }
}
