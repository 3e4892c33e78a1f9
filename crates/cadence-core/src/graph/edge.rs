//! Channel types for the dataflow graph.
//!
//! A channel links one producer port to any number of consumer ports. The
//! channel itself only records membership; whether a member produces or
//! consumes follows from the port's direction and owner, so a malformed
//! channel (two producers) can exist in the graph and be rejected by the
//! solver.

use serde::{Deserialize, Serialize};

use super::port::PortId;

/// Unique identifier for a channel in a [`DataflowGraph`](super::DataflowGraph).
///
/// Channel IDs are assigned sequentially and never reused within a graph instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelId(pub(crate) u32);

impl ChannelId {
    /// Returns the raw numeric identifier.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

impl core::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "ChannelId({})", self.0)
    }
}

/// A token-carrying connection between ports.
#[derive(Debug)]
pub(crate) struct ChannelData {
    pub name: String,
    /// Linked ports in link order.
    pub ports: Vec<PortId>,
    /// Capacity fixed by buffer-size constraining, if any.
    pub capacity: Option<u64>,
}

impl ChannelData {
    pub fn new(name: String) -> Self {
        Self {
            name,
            ports: Vec::new(),
            capacity: None,
        }
    }
}
