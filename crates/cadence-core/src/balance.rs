//! Balance equation solver.
//!
//! Assigns each actor a rational firing ratio so that every channel moves as
//! many tokens in as out per iteration, then scales each connected cluster to
//! the smallest all-integer solution.
//!
//! # Propagation
//!
//! A cluster starts at an actor with ratio 1, preferring one that has a
//! zero-rate port. From every actor that receives a ratio, the ratio flows
//! through each port to the ports on the other side of its channel: producers
//! flow to consumers, consumers flow back to the producer. Boundary ports are
//! nodes of their own with rate 1; their ratio is the number of tokens they
//! move per iteration.
//!
//! For a current port with rate `c` and a connected port with rate `p`:
//!
//! | `c` | `p` | connected ratio |
//! |-----|-----|-----------------|
//! | > 0 | > 0 | `current * c / p` |
//! | 0   | > 0 | 0 |
//! | > 0 | 0   | 1, and the current ratio is overwritten with 0 |
//! | 0   | 0   | `current` |
//!
//! A connected node that already has a ratio must match exactly.

use std::collections::BTreeMap;

use num::CheckedMul;
use num::Integer;
use num::rational::Ratio;

use crate::error::{ScheduleError, StructuralReason};
use crate::graph::{ActorId, DataflowGraph, PortDirection, PortId, PortOwner};
use crate::rate::{BoundaryRate, ExternalRates, RateProvider};
use crate::schedule::RepetitionVector;

/// A vertex of the propagation: an actor or a boundary port.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Node {
    Actor(ActorId),
    Boundary(PortId),
}

/// Rational ratios assigned so far.
struct Ratios {
    actors: Vec<Option<Ratio<u64>>>,
    boundary: BTreeMap<PortId, Ratio<u64>>,
}

impl Ratios {
    fn new(actor_count: usize) -> Self {
        Self {
            actors: vec![None; actor_count],
            boundary: BTreeMap::new(),
        }
    }

    fn get(&self, node: Node) -> Option<Ratio<u64>> {
        match node {
            Node::Actor(a) => self.actors.get(a.index() as usize).copied().flatten(),
            Node::Boundary(p) => self.boundary.get(&p).copied(),
        }
    }

    fn set(&mut self, node: Node, ratio: Ratio<u64>) {
        match node {
            Node::Actor(a) => {
                if let Some(slot) = self.actors.get_mut(a.index() as usize) {
                    *slot = Some(ratio);
                }
            }
            Node::Boundary(p) => {
                self.boundary.insert(p, ratio);
            }
        }
    }
}

/// Integer solution of the balance equations.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BalanceSolution {
    /// Firings per iteration for every actor.
    pub repetitions: RepetitionVector,
    /// Tokens per iteration for every reached boundary port.
    pub external_rates: ExternalRates,
    /// Number of independently normalized clusters.
    pub clusters: usize,
}

/// Solves the balance equations for a graph.
///
/// ```rust
/// use cadence_core::{BalanceSolver, DataflowGraph};
///
/// let mut graph = DataflowGraph::new("top");
/// let p = graph.add_actor("p");
/// let c = graph.add_actor("c");
/// let out = graph.add_output(p, "out").unwrap();
/// let input = graph.add_input(c, "in").unwrap();
/// graph.set_rate(input, 2).unwrap();
/// graph.connect(out, input).unwrap();
///
/// let solution = BalanceSolver::new(&graph, &graph).solve().unwrap();
/// assert_eq!(solution.repetitions.get(p), 2);
/// assert_eq!(solution.repetitions.get(c), 1);
/// ```
pub struct BalanceSolver<'a, R: ?Sized> {
    graph: &'a DataflowGraph,
    rates: &'a R,
    allow_disconnected: bool,
    allow_rate_changes: bool,
}

impl<'a, R: RateProvider + ?Sized> BalanceSolver<'a, R> {
    /// Creates a solver that rejects disconnected graphs and dynamic rates.
    pub fn new(graph: &'a DataflowGraph, rates: &'a R) -> Self {
        Self {
            graph,
            rates,
            allow_disconnected: false,
            allow_rate_changes: false,
        }
    }

    /// Solves each unconnected cluster independently instead of failing.
    pub fn allow_disconnected(mut self, allow: bool) -> Self {
        self.allow_disconnected = allow;
        self
    }

    /// Accepts ports whose rate may change at runtime.
    pub fn allow_rate_changes(mut self, allow: bool) -> Self {
        self.allow_rate_changes = allow;
        self
    }

    /// Runs the structural checks, propagates ratios, and normalizes each
    /// cluster to integers.
    pub fn solve(&self) -> Result<BalanceSolution, ScheduleError> {
        self.check_structure()?;
        if !self.allow_rate_changes {
            self.check_constant_rates()?;
        }

        let mut ratios = Ratios::new(self.graph.actor_count());
        let mut solution = BalanceSolution::default();

        while let Some(start) = self.pick_start(&ratios) {
            if solution.clusters > 0 && !self.allow_disconnected {
                return Err(self.disconnected(&ratios));
            }
            let cluster = self.propagate(start, &mut ratios)?;
            self.normalize(&cluster, &ratios, &mut solution)?;
            solution.clusters += 1;
        }

        Ok(solution)
    }

    /// Rejects unschedulable port directions and channels with several producers.
    fn check_structure(&self) -> Result<(), ScheduleError> {
        for port in self.graph.ports() {
            let reason = match self.graph.port_direction(port) {
                Some(PortDirection::Bidirectional) => StructuralReason::BidirectionalPort,
                Some(PortDirection::Unassigned) => StructuralReason::UndirectedPort,
                _ => continue,
            };
            let name = self.graph.port_full_name(port);
            let message = match reason {
                StructuralReason::BidirectionalPort => {
                    format!("port '{name}' is both an input and an output")
                }
                _ => format!("port '{name}' is neither an input nor an output"),
            };
            return Err(ScheduleError::structural(
                reason,
                message,
                self.owner_names(port),
                vec![name],
            ));
        }

        for channel in self.graph.channels() {
            let producers = self.graph.producers(channel);
            if producers.len() > 1 {
                let ports: Vec<String> = producers
                    .iter()
                    .map(|&p| self.graph.port_full_name(p))
                    .collect();
                let actors = producers.iter().flat_map(|&p| self.owner_names(p)).collect();
                return Err(ScheduleError::structural(
                    StructuralReason::NonDeterministicMerge,
                    format!(
                        "channel '{}' has more than one producer: {}",
                        self.graph.channel_name(channel).unwrap_or_default(),
                        ports.join(", ")
                    ),
                    actors,
                    ports,
                ));
            }
        }
        Ok(())
    }

    fn check_constant_rates(&self) -> Result<(), ScheduleError> {
        match self.graph.ports().find(|&p| !self.rates.is_constant(p)) {
            Some(port) => {
                let name = self.graph.port_full_name(port);
                Err(ScheduleError::rate_inconsistency(
                    format!("rate of port '{name}' may change at runtime"),
                    self.owner_names(port),
                    vec![name],
                ))
            }
            None => Ok(()),
        }
    }

    /// First unreached actor with a zero-rate port, else the first unreached actor.
    fn pick_start(&self, ratios: &Ratios) -> Option<ActorId> {
        let mut unreached = self
            .graph
            .actors()
            .filter(|&a| ratios.get(Node::Actor(a)).is_none())
            .peekable();
        let first = *unreached.peek()?;
        Some(
            unreached
                .find(|&a| self.graph.actor_ports(a).iter().any(|&p| self.port_rate(p) == 0))
                .unwrap_or(first),
        )
    }

    /// Assigns ratio 1 to `start` and spreads ratios through its cluster.
    /// Returns the cluster's nodes in the order they were reached.
    fn propagate(&self, start: ActorId, ratios: &mut Ratios) -> Result<Vec<Node>, ScheduleError> {
        let one = Ratio::from_integer(1);
        let zero = Ratio::from_integer(0);
        let start = Node::Actor(start);

        #[cfg(feature = "tracing")]
        tracing::debug!("balance_cluster: start at '{}'", self.node_name(start));

        ratios.set(start, one);
        let mut cluster = vec![start];
        let mut pending = vec![start];

        while let Some(node) = pending.pop() {
            for port in self.node_ports(node) {
                let current_rate = self.port_rate(port);
                for peer in self.connected(port) {
                    let peer_node = self.node_of(peer);
                    let peer_rate = self.port_rate(peer);
                    let current = ratios.get(node).unwrap_or(zero);

                    let desired = match (current_rate, peer_rate) {
                        (0, 0) => current,
                        (0, _) => zero,
                        (_, 0) => {
                            ratios.set(node, zero);
                            one
                        }
                        (c, p) => current
                            .checked_mul(&Ratio::new(u64::from(c), u64::from(p)))
                            .ok_or_else(|| self.overflow(port, peer))?,
                    };

                    match ratios.get(peer_node) {
                        Some(present) if present != desired => {
                            return Err(self.inconsistent(port, peer, present, desired));
                        }
                        Some(_) => {}
                        None => {
                            ratios.set(peer_node, desired);
                            cluster.push(peer_node);
                            pending.push(peer_node);
                        }
                    }
                }
            }
        }
        Ok(cluster)
    }

    /// Scales the cluster by the LCM of its denominators, then divides out any
    /// common factor of the nonzero results.
    fn normalize(
        &self,
        cluster: &[Node],
        ratios: &Ratios,
        solution: &mut BalanceSolution,
    ) -> Result<(), ScheduleError> {
        let mut lcm: u64 = 1;
        for &node in cluster {
            let denom = ratios.get(node).map_or(1, |r| *r.denom());
            lcm = (lcm / lcm.gcd(&denom))
                .checked_mul(denom)
                .ok_or_else(|| self.cluster_overflow(cluster))?;
        }

        let mut values = Vec::with_capacity(cluster.len());
        for &node in cluster {
            let ratio = ratios.get(node).unwrap_or_else(|| Ratio::from_integer(0));
            let numer = *ratio.numer();
            let value = numer
                .checked_mul(lcm / *ratio.denom())
                .ok_or_else(|| self.cluster_overflow(cluster))?;
            values.push((node, value));
        }

        let common = values
            .iter()
            .map(|&(_, v)| v)
            .filter(|&v| v > 0)
            .fold(0u64, |g, v| g.gcd(&v));

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "balance_normalize: {} nodes, lcm {lcm}, common factor {common}",
            cluster.len()
        );

        for (node, value) in values {
            let value = if common > 1 { value / common } else { value };
            match node {
                Node::Actor(actor) => solution.repetitions.insert(actor, value),
                Node::Boundary(port) => solution.external_rates.insert(
                    port,
                    BoundaryRate {
                        tokens_per_iteration: value,
                        init_tokens: self.boundary_init_tokens(port),
                    },
                ),
            }
        }
        Ok(())
    }

    /// A boundary input carries its own init tokens. A boundary output starts
    /// with whatever the inside producer emits at initialization.
    fn boundary_init_tokens(&self, port: PortId) -> u64 {
        let data = self.graph.port_data(port);
        if data.is_source() {
            return u64::from(self.rates.init_rate(port));
        }
        self.connected(port)
            .first()
            .map_or(0, |&producer| u64::from(self.rates.init_rate(producer)))
    }

    /// Per-firing rate of a port as seen by propagation. Boundary ports move
    /// one token per unit of ratio.
    fn port_rate(&self, port: PortId) -> u32 {
        match (self.graph.port_owner(port), self.graph.port_direction(port)) {
            (Some(PortOwner::Actor(_)), Some(PortDirection::Input)) => {
                self.rates.consumption_rate(port)
            }
            (Some(PortOwner::Actor(_)), Some(PortDirection::Output)) => {
                self.rates.production_rate(port)
            }
            (Some(PortOwner::Boundary), _) => 1,
            _ => 0,
        }
    }

    fn node_of(&self, port: PortId) -> Node {
        match self.graph.port_owner(port) {
            Some(PortOwner::Actor(actor)) => Node::Actor(actor),
            _ => Node::Boundary(port),
        }
    }

    fn node_ports(&self, node: Node) -> Vec<PortId> {
        match node {
            Node::Actor(actor) => self.graph.actor_ports(actor).to_vec(),
            Node::Boundary(port) => vec![port],
        }
    }

    /// Ports on the other side of this port's channel.
    fn connected(&self, port: PortId) -> Vec<PortId> {
        let Some(channel) = self.graph.port_channel(port) else {
            return Vec::new();
        };
        let data = self.graph.port_data(port);
        if data.is_source() {
            self.graph.consumers(channel)
        } else if data.is_sink() {
            self.graph.producers(channel)
        } else {
            Vec::new()
        }
    }

    fn node_name(&self, node: Node) -> String {
        match node {
            Node::Actor(actor) => self.graph.actor_label(actor),
            Node::Boundary(port) => self.graph.port_full_name(port),
        }
    }

    fn owner_names(&self, port: PortId) -> Vec<String> {
        match self.graph.port_owner(port) {
            Some(PortOwner::Actor(actor)) => vec![self.graph.actor_label(actor)],
            _ => Vec::new(),
        }
    }

    fn inconsistent(
        &self,
        port: PortId,
        peer: PortId,
        present: Ratio<u64>,
        desired: Ratio<u64>,
    ) -> ScheduleError {
        let peer_name = self.node_name(self.node_of(peer));
        let mut actors = self.owner_names(port);
        actors.extend(self.owner_names(peer));
        ScheduleError::rate_inconsistency(
            format!(
                "'{peer_name}' needs ratio {desired} through '{}' but already has {present}",
                self.graph.port_full_name(port)
            ),
            actors,
            vec![
                self.graph.port_full_name(port),
                self.graph.port_full_name(peer),
            ],
        )
    }

    fn overflow(&self, port: PortId, peer: PortId) -> ScheduleError {
        let mut actors = self.owner_names(port);
        actors.extend(self.owner_names(peer));
        ScheduleError::rate_inconsistency(
            "firing ratio overflowed 64 bits",
            actors,
            vec![
                self.graph.port_full_name(port),
                self.graph.port_full_name(peer),
            ],
        )
    }

    fn cluster_overflow(&self, cluster: &[Node]) -> ScheduleError {
        let actors = cluster
            .iter()
            .filter_map(|&n| match n {
                Node::Actor(actor) => Some(self.graph.actor_label(actor)),
                Node::Boundary(_) => None,
            })
            .collect();
        ScheduleError::rate_inconsistency(
            "repetition counts overflowed 64 bits",
            actors,
            Vec::new(),
        )
    }

    fn disconnected(&self, ratios: &Ratios) -> ScheduleError {
        let (reached, unreached): (Vec<ActorId>, Vec<ActorId>) = self
            .graph
            .actors()
            .partition(|&a| ratios.get(Node::Actor(a)).is_some());
        let names = |ids: &[ActorId]| -> Vec<String> {
            ids.iter().map(|&a| self.graph.actor_label(a)).collect()
        };
        let reached = names(&reached);
        let unreached = names(&unreached);
        let message = format!(
            "graph is not connected; unreached actors: {}; reached actors: {}",
            unreached.join(", "),
            reached.join(", ")
        );
        let mut actors = unreached;
        actors.extend(reached);
        ScheduleError::structural(StructuralReason::Disconnected, message, actors, Vec::new())
    }
}
