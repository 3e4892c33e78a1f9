//! Rate collaborators: where rates come from and where boundary rates go.
//!
//! The scheduler never reads rates off the graph directly. It asks a
//! [`RateProvider`], which lets callers layer overrides
//! ([`RateOverrides`]) or back rates with their own parameter system. After a
//! successful pass the inferred boundary rates are pushed to an
//! [`ExternalRateSink`] so an enclosing scope can treat the scheduled graph as
//! one multirate actor.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::graph::{DataflowGraph, PortDirection, PortId, PortOwner};

/// Supplies per-port token rates for one scheduling pass.
///
/// Rates are read lazily and assumed constant for the duration of the pass.
pub trait RateProvider {
    /// Tokens consumed per firing. Only meaningful for input ports.
    fn consumption_rate(&self, port: PortId) -> u32;

    /// Tokens produced per firing. Only meaningful for output ports.
    fn production_rate(&self, port: PortId) -> u32;

    /// Tokens present (inputs) or produced (outputs) before the first firing.
    fn init_rate(&self, port: PortId) -> u32;

    /// Returns false when the rate is backed by an expression that may change
    /// at runtime.
    fn is_constant(&self, _port: PortId) -> bool {
        true
    }
}

impl<R: RateProvider + ?Sized> RateProvider for &R {
    fn consumption_rate(&self, port: PortId) -> u32 {
        (**self).consumption_rate(port)
    }

    fn production_rate(&self, port: PortId) -> u32 {
        (**self).production_rate(port)
    }

    fn init_rate(&self, port: PortId) -> u32 {
        (**self).init_rate(port)
    }

    fn is_constant(&self, port: PortId) -> bool {
        (**self).is_constant(port)
    }
}

/// Layers per-port overrides over another provider.
///
/// A rate override answers both `consumption_rate` and `production_rate`;
/// the scheduler only asks the one matching the port's direction.
///
/// ```rust
/// use cadence_core::{DataflowGraph, RateOverrides, RateProvider};
///
/// let mut graph = DataflowGraph::new("top");
/// let a = graph.add_actor("a");
/// let out = graph.add_output(a, "out").unwrap();
///
/// let rates = RateOverrides::new(&graph).with_rate(out, 5);
/// assert_eq!(rates.production_rate(out), 5);
/// assert_eq!(graph.production_rate(out), 1);
/// ```
pub struct RateOverrides<'a, R: ?Sized> {
    base: &'a R,
    rates: BTreeMap<PortId, u32>,
    init_rates: BTreeMap<PortId, u32>,
}

impl<'a, R: RateProvider + ?Sized> RateOverrides<'a, R> {
    /// Wraps a provider with no overrides.
    pub fn new(base: &'a R) -> Self {
        Self {
            base,
            rates: BTreeMap::new(),
            init_rates: BTreeMap::new(),
        }
    }

    /// Overrides the per-firing rate of a port.
    pub fn with_rate(mut self, port: PortId, rate: u32) -> Self {
        self.rates.insert(port, rate);
        self
    }

    /// Overrides the init rate of a port.
    pub fn with_init_rate(mut self, port: PortId, tokens: u32) -> Self {
        self.init_rates.insert(port, tokens);
        self
    }

    /// Sets a rate override in place.
    pub fn set_rate(&mut self, port: PortId, rate: u32) {
        self.rates.insert(port, rate);
    }
}

impl<R: RateProvider + ?Sized> RateProvider for RateOverrides<'_, R> {
    fn consumption_rate(&self, port: PortId) -> u32 {
        self.rates
            .get(&port)
            .copied()
            .unwrap_or_else(|| self.base.consumption_rate(port))
    }

    fn production_rate(&self, port: PortId) -> u32 {
        self.rates
            .get(&port)
            .copied()
            .unwrap_or_else(|| self.base.production_rate(port))
    }

    fn init_rate(&self, port: PortId) -> u32 {
        self.init_rates
            .get(&port)
            .copied()
            .unwrap_or_else(|| self.base.init_rate(port))
    }

    fn is_constant(&self, port: PortId) -> bool {
        self.base.is_constant(port)
    }
}

/// Tokens a boundary port moves per schedule iteration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundaryRate {
    /// Tokens crossing the boundary per iteration.
    pub tokens_per_iteration: u64,
    /// Tokens present before the first iteration. For a boundary output this
    /// is the init production of the producer on the inside.
    pub init_tokens: u64,
}

/// Inferred boundary rates, keyed by boundary port.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalRates(BTreeMap<PortId, BoundaryRate>);

impl ExternalRates {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a port's rate.
    pub fn insert(&mut self, port: PortId, rate: BoundaryRate) {
        self.0.insert(port, rate);
    }

    /// Returns a port's rate.
    pub fn get(&self, port: PortId) -> Option<BoundaryRate> {
        self.0.get(&port).copied()
    }

    /// Number of boundary ports with a recorded rate.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true when no boundary rates were inferred.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates in port order.
    pub fn iter(&self) -> impl Iterator<Item = (PortId, BoundaryRate)> + '_ {
        self.0.iter().map(|(&p, &r)| (p, r))
    }
}

/// Receives boundary rates after a schedule is computed or reused from cache.
pub trait ExternalRateSink {
    /// Applies the rates. Called on every cache hit as well as on a fresh pass.
    fn apply_external_rates(&mut self, rates: &ExternalRates);
}

/// Discards the rates.
impl ExternalRateSink for () {
    fn apply_external_rates(&mut self, _rates: &ExternalRates) {}
}

/// Canonical encoding of every port's rate values.
///
/// Two graphs with equal topology and equal signatures yield the same
/// schedule, so the signature is the cache key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RateSignature(String);

impl RateSignature {
    /// Builds the signature by walking ports in ID order and appending
    /// `rate/init;` for each, or `rate/init/d;` when the port's rate is not
    /// constant.
    ///
    /// Input ports contribute their consumption rate, output ports their
    /// production rate. Boundary ports and ports with an unschedulable
    /// direction contribute rate 0.
    pub fn compute<R: RateProvider + ?Sized>(graph: &DataflowGraph, rates: &R) -> Self {
        use std::fmt::Write as _;

        let mut key = String::with_capacity(graph.port_count() * 4);
        for port in graph.ports() {
            let rate = match (graph.port_owner(port), graph.port_direction(port)) {
                (Some(PortOwner::Actor(_)), Some(PortDirection::Input)) => {
                    rates.consumption_rate(port)
                }
                (Some(PortOwner::Actor(_)), Some(PortDirection::Output)) => {
                    rates.production_rate(port)
                }
                _ => 0,
            };
            let _ = write!(key, "{}/{}", rate, rates.init_rate(port));
            if !rates.is_constant(port) {
                key.push_str("/d");
            }
            key.push(';');
        }
        Self(key)
    }

    /// Returns the encoded key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RateSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
