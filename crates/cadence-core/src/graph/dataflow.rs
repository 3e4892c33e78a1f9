//! Dataflow graph: mutation API, queries, and recorded scheduling results.
//!
//! [`DataflowGraph`] owns the topology (actors, ports, channels) together with
//! the declared port rates. It is the default Graph and
//! [`RateProvider`](crate::RateProvider) collaborator for the scheduler.
//!
//! Topology mutations bump a version counter. Together with a process-unique
//! graph id this forms a [`TopologyStamp`], which the schedule cache compares
//! before trusting any cached entry. Rate changes do not bump the version;
//! they change the [`RateSignature`](crate::RateSignature) instead.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::rate::{BoundaryRate, ExternalRateSink, ExternalRates, RateProvider};
use crate::schedule::RepetitionVector;

use super::edge::{ChannelData, ChannelId};
use super::node::{ActorData, ActorId};
use super::port::{PortData, PortDirection, PortId, PortOwner};

static NEXT_GRAPH_ID: AtomicU64 = AtomicU64::new(1);

/// Errors that can occur during graph mutation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// The specified actor was not found in the graph.
    #[error("actor {0} not found")]
    ActorNotFound(ActorId),
    /// The specified port was not found in the graph.
    #[error("port {0} not found")]
    PortNotFound(PortId),
    /// The specified channel was not found in the graph.
    #[error("channel {0} not found")]
    ChannelNotFound(ChannelId),
    /// The port is already linked to a different channel.
    #[error("port {0} is already linked to another channel")]
    PortAlreadyLinked(PortId),
    /// The port is already linked to this channel.
    #[error("port {port} is already linked to {channel}")]
    DuplicateLink {
        /// Port that was linked twice.
        port: PortId,
        /// Channel it is already linked to.
        channel: ChannelId,
    },
    /// An actor already has a port with this name.
    #[error("duplicate port name '{0}'")]
    DuplicateName(String),
}

/// Identity of a graph topology at one point in time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TopologyStamp {
    graph: u64,
    version: u64,
}

/// A synchronous dataflow graph.
///
/// # Usage
///
/// 1. Create a graph with [`new()`](Self::new)
/// 2. Add actors and ports: [`add_actor()`](Self::add_actor),
///    [`add_input()`](Self::add_input), [`add_output()`](Self::add_output),
///    [`add_boundary_input()`](Self::add_boundary_input)
/// 3. Declare rates: [`set_rate()`](Self::set_rate),
///    [`set_init_rate()`](Self::set_init_rate)
/// 4. Wire ports: [`connect()`](Self::connect) or
///    [`add_channel()`](Self::add_channel) + [`link()`](Self::link)
/// 5. Schedule with a [`Scheduler`](crate::Scheduler)
#[derive(Debug)]
pub struct DataflowGraph {
    id: u64,
    name: String,
    actors: Vec<ActorData>,
    ports: Vec<PortData>,
    channels: Vec<ChannelData>,
    topology_version: u64,
}

impl DataflowGraph {
    /// Creates a new empty graph. The name prefixes boundary port names.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: NEXT_GRAPH_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            actors: Vec::new(),
            ports: Vec::new(),
            channels: Vec::new(),
            topology_version: 0,
        }
    }

    /// Returns the graph name.
    pub fn name(&self) -> &str {
        &self.name
    }

    // --- Actor and port mutations ---

    /// Adds an actor with no ports. Returns the new actor's ID.
    pub fn add_actor(&mut self, name: impl Into<String>) -> ActorId {
        let id = ActorId(self.actors.len() as u32);
        self.actors.push(ActorData::new(name.into()));
        self.touch();
        #[cfg(feature = "tracing")]
        tracing::debug!("graph_add: actor {id} '{}'", self.actors[id.0 as usize].name);
        id
    }

    /// Adds an input port to an actor.
    pub fn add_input(
        &mut self,
        actor: ActorId,
        name: impl Into<String>,
    ) -> Result<PortId, GraphError> {
        self.add_port(actor, name, PortDirection::Input)
    }

    /// Adds an output port to an actor.
    pub fn add_output(
        &mut self,
        actor: ActorId,
        name: impl Into<String>,
    ) -> Result<PortId, GraphError> {
        self.add_port(actor, name, PortDirection::Output)
    }

    /// Adds a port with an explicit direction to an actor.
    ///
    /// `Bidirectional` and `Unassigned` ports are accepted here and rejected
    /// when the graph is scheduled.
    pub fn add_port(
        &mut self,
        actor: ActorId,
        name: impl Into<String>,
        direction: PortDirection,
    ) -> Result<PortId, GraphError> {
        let name = name.into();
        let data = self
            .actors
            .get(actor.0 as usize)
            .ok_or(GraphError::ActorNotFound(actor))?;
        if data.ports.iter().any(|p| self.ports[p.0 as usize].name == name) {
            return Err(GraphError::DuplicateName(name));
        }
        let id = self.push_port(PortData::new(name, PortOwner::Actor(actor), direction));
        self.actors[actor.0 as usize].ports.push(id);
        Ok(id)
    }

    /// Adds an input port on the graph boundary. On the inside it produces tokens.
    pub fn add_boundary_input(&mut self, name: impl Into<String>) -> Result<PortId, GraphError> {
        self.add_boundary_port(name, PortDirection::Input)
    }

    /// Adds an output port on the graph boundary. On the inside it consumes tokens.
    pub fn add_boundary_output(&mut self, name: impl Into<String>) -> Result<PortId, GraphError> {
        self.add_boundary_port(name, PortDirection::Output)
    }

    /// Adds a boundary port with an explicit direction.
    pub fn add_boundary_port(
        &mut self,
        name: impl Into<String>,
        direction: PortDirection,
    ) -> Result<PortId, GraphError> {
        let name = name.into();
        if self.find_boundary_port(&name).is_some() {
            return Err(GraphError::DuplicateName(name));
        }
        Ok(self.push_port(PortData::new(name, PortOwner::Boundary, direction)))
    }

    fn push_port(&mut self, data: PortData) -> PortId {
        let id = PortId(self.ports.len() as u32);
        self.ports.push(data);
        self.touch();
        id
    }

    // --- Rate declarations ---

    /// Declares the per-firing rate of a port (consumption for inputs,
    /// production for outputs).
    pub fn set_rate(&mut self, port: PortId, rate: u32) -> Result<(), GraphError> {
        self.port_mut(port)?.rate = Some(rate);
        Ok(())
    }

    /// Declares the number of tokens present (inputs) or produced (outputs)
    /// before the first firing.
    pub fn set_init_rate(&mut self, port: PortId, tokens: u32) -> Result<(), GraphError> {
        self.port_mut(port)?.init_rate = Some(tokens);
        Ok(())
    }

    /// Marks a port's rate as backed by an expression that may change at runtime.
    pub fn mark_dynamic(&mut self, port: PortId, dynamic: bool) -> Result<(), GraphError> {
        self.port_mut(port)?.dynamic = dynamic;
        Ok(())
    }

    // --- Wiring ---

    /// Adds an empty channel. Returns its ID.
    pub fn add_channel(&mut self, name: impl Into<String>) -> ChannelId {
        let id = ChannelId(self.channels.len() as u32);
        self.channels.push(ChannelData::new(name.into()));
        self.touch();
        id
    }

    /// Links a port to a channel.
    ///
    /// A port can belong to at most one channel.
    pub fn link(&mut self, port: PortId, channel: ChannelId) -> Result<(), GraphError> {
        if channel.0 as usize >= self.channels.len() {
            return Err(GraphError::ChannelNotFound(channel));
        }
        match self.port(port)?.channel {
            Some(existing) if existing == channel => {
                return Err(GraphError::DuplicateLink { port, channel });
            }
            Some(_) => return Err(GraphError::PortAlreadyLinked(port)),
            None => {}
        }
        self.ports[port.0 as usize].channel = Some(channel);
        self.channels[channel.0 as usize].ports.push(port);
        self.touch();
        #[cfg(feature = "tracing")]
        tracing::debug!("graph_link: {port} → {channel}");
        Ok(())
    }

    /// Connects two ports, reusing whichever one already has a channel.
    ///
    /// If `from` already has a channel, `to` joins it (fan-out). If only `to`
    /// has one, `from` joins it; when that channel already has a producer this
    /// builds a merge, which the solver rejects.
    pub fn connect(&mut self, from: PortId, to: PortId) -> Result<ChannelId, GraphError> {
        let from_channel = self.port(from)?.channel;
        let to_channel = self.port(to)?.channel;
        let channel = match (from_channel, to_channel) {
            (Some(a), Some(b)) if a == b => {
                return Err(GraphError::DuplicateLink {
                    port: to,
                    channel: a,
                });
            }
            (Some(_), Some(_)) => return Err(GraphError::PortAlreadyLinked(to)),
            (Some(a), None) => {
                self.link(to, a)?;
                a
            }
            (None, Some(b)) => {
                self.link(from, b)?;
                b
            }
            (None, None) => {
                let channel = self.add_channel(format!("ch{}", self.channels.len()));
                self.link(from, channel)?;
                self.link(to, channel)?;
                channel
            }
        };
        Ok(channel)
    }

    /// Removes a port from its channel, if any.
    pub fn disconnect(&mut self, port: PortId) -> Result<(), GraphError> {
        let Some(channel) = self.port(port)?.channel else {
            return Ok(());
        };
        self.channels[channel.0 as usize].ports.retain(|&p| p != port);
        self.ports[port.0 as usize].channel = None;
        self.touch();
        #[cfg(feature = "tracing")]
        tracing::debug!("graph_disconnect: {port} from {channel}");
        Ok(())
    }

    // --- Queries ---

    /// Returns the number of actors.
    pub fn actor_count(&self) -> usize {
        self.actors.len()
    }

    /// Returns the number of ports, boundary ports included.
    pub fn port_count(&self) -> usize {
        self.ports.len()
    }

    /// Returns the number of channels.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Iterates over all actor IDs in creation order.
    pub fn actors(&self) -> impl Iterator<Item = ActorId> + '_ {
        (0..self.actors.len() as u32).map(ActorId)
    }

    /// Iterates over all port IDs in creation order.
    pub fn ports(&self) -> impl Iterator<Item = PortId> + '_ {
        (0..self.ports.len() as u32).map(PortId)
    }

    /// Iterates over all channel IDs in creation order.
    pub fn channels(&self) -> impl Iterator<Item = ChannelId> + '_ {
        (0..self.channels.len() as u32).map(ChannelId)
    }

    /// Iterates over the ports on the graph boundary.
    pub fn boundary_ports(&self) -> impl Iterator<Item = PortId> + '_ {
        self.ports()
            .filter(|p| self.ports[p.0 as usize].owner == PortOwner::Boundary)
    }

    /// Returns an actor's name.
    pub fn actor_name(&self, actor: ActorId) -> Option<&str> {
        self.actors.get(actor.0 as usize).map(|a| a.name.as_str())
    }

    /// Returns an actor's ports in declaration order.
    pub fn actor_ports(&self, actor: ActorId) -> &[PortId] {
        self.actors
            .get(actor.0 as usize)
            .map_or(&[], |a| a.ports.as_slice())
    }

    /// Iterates over an actor's input ports.
    pub fn inputs(&self, actor: ActorId) -> impl Iterator<Item = PortId> + '_ {
        self.actor_ports(actor)
            .iter()
            .copied()
            .filter(|p| self.ports[p.0 as usize].direction == PortDirection::Input)
    }

    /// Iterates over an actor's output ports.
    pub fn outputs(&self, actor: ActorId) -> impl Iterator<Item = PortId> + '_ {
        self.actor_ports(actor)
            .iter()
            .copied()
            .filter(|p| self.ports[p.0 as usize].direction == PortDirection::Output)
    }

    /// Finds an actor by name.
    pub fn find_actor(&self, name: &str) -> Option<ActorId> {
        self.actors
            .iter()
            .position(|a| a.name == name)
            .map(|i| ActorId(i as u32))
    }

    /// Finds a port of an actor by name.
    pub fn find_port(&self, actor: ActorId, name: &str) -> Option<PortId> {
        self.actor_ports(actor)
            .iter()
            .copied()
            .find(|p| self.ports[p.0 as usize].name == name)
    }

    /// Finds a boundary port by name.
    pub fn find_boundary_port(&self, name: &str) -> Option<PortId> {
        self.ports()
            .find(|p| {
                let data = &self.ports[p.0 as usize];
                data.owner == PortOwner::Boundary && data.name == name
            })
    }

    /// Returns a port's own name.
    pub fn port_name(&self, port: PortId) -> Option<&str> {
        self.ports.get(port.0 as usize).map(|p| p.name.as_str())
    }

    /// Returns `actor.port`, or `graph.port` for boundary ports.
    pub fn port_full_name(&self, port: PortId) -> String {
        let Some(data) = self.ports.get(port.0 as usize) else {
            return port.to_string();
        };
        match data.owner {
            PortOwner::Actor(actor) => format!("{}.{}", self.actors[actor.0 as usize].name, data.name),
            PortOwner::Boundary => format!("{}.{}", self.name, data.name),
        }
    }

    /// Returns what a port is attached to.
    pub fn port_owner(&self, port: PortId) -> Option<PortOwner> {
        self.ports.get(port.0 as usize).map(|p| p.owner)
    }

    /// Returns a port's direction.
    pub fn port_direction(&self, port: PortId) -> Option<PortDirection> {
        self.ports.get(port.0 as usize).map(|p| p.direction)
    }

    /// Returns the channel a port is linked to.
    pub fn port_channel(&self, port: PortId) -> Option<ChannelId> {
        self.ports.get(port.0 as usize).and_then(|p| p.channel)
    }

    /// Returns a channel's name.
    pub fn channel_name(&self, channel: ChannelId) -> Option<&str> {
        self.channels.get(channel.0 as usize).map(|c| c.name.as_str())
    }

    /// Returns every port linked to a channel, in link order.
    pub fn channel_ports(&self, channel: ChannelId) -> &[PortId] {
        self.channels
            .get(channel.0 as usize)
            .map_or(&[], |c| c.ports.as_slice())
    }

    /// Ports that put tokens into the channel (actor outputs, boundary inputs).
    pub fn producers(&self, channel: ChannelId) -> Vec<PortId> {
        self.channel_ports(channel)
            .iter()
            .copied()
            .filter(|p| self.ports[p.0 as usize].is_source())
            .collect()
    }

    /// Ports that take tokens from the channel (actor inputs, boundary outputs).
    pub fn consumers(&self, channel: ChannelId) -> Vec<PortId> {
        self.channel_ports(channel)
            .iter()
            .copied()
            .filter(|p| self.ports[p.0 as usize].is_sink())
            .collect()
    }

    /// Returns the current topology stamp.
    pub fn topology_stamp(&self) -> TopologyStamp {
        TopologyStamp {
            graph: self.id,
            version: self.topology_version,
        }
    }

    // --- Recorded scheduling results ---

    /// Boundary rate recorded by the last schedule.
    pub fn boundary_rate(&self, port: PortId) -> Option<BoundaryRate> {
        self.ports.get(port.0 as usize).and_then(|p| p.inferred)
    }

    /// Capacity fixed by buffer-size constraining, if any.
    pub fn channel_capacity(&self, channel: ChannelId) -> Option<u64> {
        self.channels.get(channel.0 as usize).and_then(|c| c.capacity)
    }

    /// Firings per iteration recorded by the last schedule.
    pub fn firings_per_iteration(&self, actor: ActorId) -> Option<u64> {
        self.actors
            .get(actor.0 as usize)
            .and_then(|a| a.firings_per_iteration)
    }

    /// Fixes each listed channel's capacity.
    pub fn apply_buffer_sizes(&mut self, sizes: &BTreeMap<ChannelId, u64>) {
        for (channel, &size) in sizes {
            if let Some(data) = self.channels.get_mut(channel.0 as usize) {
                data.capacity = Some(size);
            }
        }
    }

    /// Records firings per iteration for each actor in the vector.
    pub fn record_firing_counts(&mut self, repetitions: &RepetitionVector) {
        for (actor, count) in repetitions.iter() {
            if let Some(data) = self.actors.get_mut(actor.0 as usize) {
                data.firings_per_iteration = Some(count);
            }
        }
    }

    /// Forgets every recorded result: boundary rates, capacities, firing counts.
    pub fn clear_recorded(&mut self) {
        for port in &mut self.ports {
            port.inferred = None;
        }
        for channel in &mut self.channels {
            channel.capacity = None;
        }
        for actor in &mut self.actors {
            actor.firings_per_iteration = None;
        }
    }

    // --- Internal accessors ---

    fn port(&self, port: PortId) -> Result<&PortData, GraphError> {
        self.ports
            .get(port.0 as usize)
            .ok_or(GraphError::PortNotFound(port))
    }

    fn port_mut(&mut self, port: PortId) -> Result<&mut PortData, GraphError> {
        self.ports
            .get_mut(port.0 as usize)
            .ok_or(GraphError::PortNotFound(port))
    }

    /// Port data for an ID this graph issued.
    pub(crate) fn port_data(&self, port: PortId) -> &PortData {
        &self.ports[port.0 as usize]
    }

    pub(crate) fn actor_label(&self, actor: ActorId) -> String {
        self.actor_name(actor)
            .map_or_else(|| actor.to_string(), str::to_string)
    }

    fn touch(&mut self) {
        self.topology_version += 1;
    }
}

impl RateProvider for DataflowGraph {
    fn consumption_rate(&self, port: PortId) -> u32 {
        self.ports
            .get(port.0 as usize)
            .filter(|p| p.direction.is_input())
            .map_or(0, |p| p.rate.unwrap_or(1))
    }

    fn production_rate(&self, port: PortId) -> u32 {
        self.ports
            .get(port.0 as usize)
            .filter(|p| p.direction.is_output())
            .map_or(0, |p| p.rate.unwrap_or(1))
    }

    fn init_rate(&self, port: PortId) -> u32 {
        self.ports
            .get(port.0 as usize)
            .and_then(|p| p.init_rate)
            .unwrap_or(0)
    }

    fn is_constant(&self, port: PortId) -> bool {
        self.ports.get(port.0 as usize).is_none_or(|p| !p.dynamic)
    }
}

impl ExternalRateSink for DataflowGraph {
    fn apply_external_rates(&mut self, rates: &ExternalRates) {
        for (port, rate) in rates.iter() {
            if let Some(data) = self.ports.get_mut(port.0 as usize) {
                data.inferred = Some(rate);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> (DataflowGraph, PortId, PortId) {
        let mut graph = DataflowGraph::new("top");
        let a = graph.add_actor("a");
        let b = graph.add_actor("b");
        let out = graph.add_output(a, "out").unwrap();
        let input = graph.add_input(b, "in").unwrap();
        (graph, out, input)
    }

    #[test]
    fn test_add_actors_and_ports() {
        let (graph, out, input) = pair();
        assert_eq!(graph.actor_count(), 2);
        assert_eq!(graph.port_count(), 2);
        assert_eq!(graph.port_full_name(out), "a.out");
        assert_eq!(graph.port_full_name(input), "b.in");
        assert_eq!(graph.port_direction(out), Some(PortDirection::Output));
    }

    #[test]
    fn test_duplicate_port_name_rejected() {
        let mut graph = DataflowGraph::new("top");
        let a = graph.add_actor("a");
        graph.add_input(a, "in").unwrap();
        let result = graph.add_output(a, "in");
        assert!(matches!(result, Err(GraphError::DuplicateName(_))));
    }

    #[test]
    fn test_connect_creates_channel() {
        let (mut graph, out, input) = pair();
        let ch = graph.connect(out, input).unwrap();
        assert_eq!(graph.channel_count(), 1);
        assert_eq!(graph.producers(ch), vec![out]);
        assert_eq!(graph.consumers(ch), vec![input]);
    }

    #[test]
    fn test_connect_fan_out_reuses_channel() {
        let (mut graph, out, input) = pair();
        let c = graph.add_actor("c");
        let second = graph.add_input(c, "in").unwrap();
        let ch1 = graph.connect(out, input).unwrap();
        let ch2 = graph.connect(out, second).unwrap();
        assert_eq!(ch1, ch2);
        assert_eq!(graph.consumers(ch1).len(), 2);
    }

    #[test]
    fn test_connect_twice_is_duplicate() {
        let (mut graph, out, input) = pair();
        graph.connect(out, input).unwrap();
        let result = graph.connect(out, input);
        assert!(matches!(result, Err(GraphError::DuplicateLink { .. })));
    }

    #[test]
    fn test_connect_into_linked_consumer_builds_merge() {
        let (mut graph, out, input) = pair();
        let c = graph.add_actor("c");
        let other = graph.add_output(c, "out").unwrap();
        let ch = graph.connect(out, input).unwrap();
        assert_eq!(graph.connect(other, input).unwrap(), ch);
        assert_eq!(graph.producers(ch).len(), 2);
    }

    #[test]
    fn test_disconnect() {
        let (mut graph, out, input) = pair();
        let ch = graph.connect(out, input).unwrap();
        graph.disconnect(input).unwrap();
        assert_eq!(graph.port_channel(input), None);
        assert!(graph.consumers(ch).is_empty());
    }

    #[test]
    fn test_topology_stamp_changes_on_mutation_only() {
        let (mut graph, out, input) = pair();
        let before = graph.topology_stamp();
        graph.set_rate(out, 3).unwrap();
        assert_eq!(graph.topology_stamp(), before);
        graph.connect(out, input).unwrap();
        assert_ne!(graph.topology_stamp(), before);
    }

    #[test]
    fn test_distinct_graphs_have_distinct_stamps() {
        let a = DataflowGraph::new("x");
        let b = DataflowGraph::new("x");
        assert_ne!(a.topology_stamp(), b.topology_stamp());
    }

    #[test]
    fn test_rate_defaults() {
        let (mut graph, out, input) = pair();
        assert_eq!(graph.production_rate(out), 1);
        assert_eq!(graph.consumption_rate(input), 1);
        assert_eq!(graph.consumption_rate(out), 0);
        assert_eq!(graph.init_rate(out), 0);
        graph.set_rate(input, 4).unwrap();
        graph.set_init_rate(out, 2).unwrap();
        assert_eq!(graph.consumption_rate(input), 4);
        assert_eq!(graph.init_rate(out), 2);
    }

    #[test]
    fn test_boundary_port_names() {
        let mut graph = DataflowGraph::new("top");
        let port = graph.add_boundary_input("in").unwrap();
        assert_eq!(graph.port_full_name(port), "top.in");
        assert_eq!(graph.find_boundary_port("in"), Some(port));
        assert!(graph.add_boundary_output("in").is_err());
    }

    #[test]
    fn test_unknown_port_errors() {
        let mut graph = DataflowGraph::new("top");
        assert_eq!(
            graph.set_rate(PortId(7), 1),
            Err(GraphError::PortNotFound(PortId(7)))
        );
    }
}
