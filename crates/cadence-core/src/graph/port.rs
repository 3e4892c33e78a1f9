//! Port types for the dataflow graph.
//!
//! A port belongs either to an actor or to the boundary of the graph itself
//! (the enclosing scope). Boundary inputs act as producers on the inside;
//! boundary outputs act as consumers.

use serde::{Deserialize, Serialize};

use super::edge::ChannelId;
use super::node::ActorId;
use crate::rate::BoundaryRate;

/// Unique identifier for a port in a [`DataflowGraph`](super::DataflowGraph).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortId(pub(crate) u32);

impl PortId {
    /// Returns the raw numeric identifier.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

impl core::fmt::Display for PortId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "PortId({})", self.0)
    }
}

/// Direction of a port.
///
/// Only `Input` and `Output` are schedulable. The other two exist so that a
/// malformed graph can be represented and rejected at scheduling time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortDirection {
    /// Consumes tokens.
    Input,
    /// Produces tokens.
    Output,
    /// Declared as both input and output.
    Bidirectional,
    /// Declared as neither input nor output.
    Unassigned,
}

impl PortDirection {
    /// Returns true for `Input` and `Bidirectional`.
    pub fn is_input(self) -> bool {
        matches!(self, Self::Input | Self::Bidirectional)
    }

    /// Returns true for `Output` and `Bidirectional`.
    pub fn is_output(self) -> bool {
        matches!(self, Self::Output | Self::Bidirectional)
    }
}

/// What a port is attached to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PortOwner {
    /// A port on an actor inside the graph.
    Actor(ActorId),
    /// A port on the graph's own boundary.
    Boundary,
}

/// Internal bookkeeping for a port.
#[derive(Debug)]
pub(crate) struct PortData {
    pub name: String,
    pub owner: PortOwner,
    pub direction: PortDirection,
    /// Declared per-firing rate. `None` means the default of 1.
    pub rate: Option<u32>,
    /// Declared initial tokens. `None` means 0.
    pub init_rate: Option<u32>,
    /// Rate is backed by an expression that may change at runtime.
    pub dynamic: bool,
    pub channel: Option<ChannelId>,
    /// Boundary rate inferred by the last schedule.
    pub inferred: Option<BoundaryRate>,
}

impl PortData {
    pub fn new(name: String, owner: PortOwner, direction: PortDirection) -> Self {
        Self {
            name,
            owner,
            direction,
            rate: None,
            init_rate: None,
            dynamic: false,
            channel: None,
            inferred: None,
        }
    }

    /// A port that puts tokens into its channel: actor output or boundary input.
    pub fn is_source(&self) -> bool {
        match self.owner {
            PortOwner::Actor(_) => self.direction == PortDirection::Output,
            PortOwner::Boundary => self.direction == PortDirection::Input,
        }
    }

    /// A port that takes tokens from its channel: actor input or boundary output.
    pub fn is_sink(&self) -> bool {
        match self.owner {
            PortOwner::Actor(_) => self.direction == PortDirection::Input,
            PortOwner::Boundary => self.direction == PortDirection::Output,
        }
    }
}
