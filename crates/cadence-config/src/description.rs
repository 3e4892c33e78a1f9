//! Graph description file format and operations.

use std::path::Path;

use cadence_core::{ActorId, DataflowGraph, PortDirection, PortId, SchedulerConfig};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::validation::{ValidationError, ValidationResult, validate_description};

/// A dataflow graph written down as data.
///
/// Connection endpoints are written `actor.port` for actor ports and as a
/// bare name for boundary ports.
///
/// # TOML Format
///
/// ```toml
/// name = "decimate"
/// description = "Boundary input filtered 4:1"
///
/// [scheduler]
/// constrain_buffer_sizes = true
///
/// [[boundary]]
/// name = "in"
/// direction = "input"
///
/// [[actors]]
/// name = "filter"
/// [[actors.ports]]
/// name = "in"
/// direction = "input"
/// rate = 4
/// [[actors.ports]]
/// name = "out"
/// direction = "output"
///
/// [[connections]]
/// from = "in"
/// to = ["filter.in"]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphDescription {
    /// Name of the graph.
    pub name: String,

    /// Optional description of the graph.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Scheduler settings for this graph.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Ports on the graph's own boundary.
    #[serde(default)]
    pub boundary: Vec<PortDescription>,

    /// Actors in declaration order.
    #[serde(default)]
    pub actors: Vec<ActorDescription>,

    /// Channels, one per entry.
    #[serde(default)]
    pub connections: Vec<ConnectionDescription>,
}

/// One actor and its ports.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActorDescription {
    /// Actor name, unique within the graph.
    pub name: String,

    /// Ports in declaration order.
    #[serde(default)]
    pub ports: Vec<PortDescription>,
}

/// One port. Unset rates fall back to the graph defaults: 1 token per
/// firing and no initial tokens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PortDescription {
    /// Port name, unique within its owner.
    pub name: String,

    /// Port direction.
    pub direction: PortDirection,

    /// Tokens per firing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<u32>,

    /// Tokens present before the first iteration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_rate: Option<u32>,

    /// Whether the rate may change at runtime.
    #[serde(default, skip_serializing_if = "is_false")]
    pub dynamic: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// One channel: a producing endpoint and the endpoints it feeds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionDescription {
    /// Producing endpoint.
    pub from: String,

    /// Consuming endpoints.
    pub to: Vec<String>,

    /// Channel name. Generated when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A parsed connection endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint<'a> {
    /// `actor.port`
    Actor {
        /// Actor name.
        actor: &'a str,
        /// Port name.
        port: &'a str,
    },
    /// A boundary port name.
    Boundary(&'a str),
}

impl<'a> Endpoint<'a> {
    /// Splits `actor.port` at the first dot; anything without one is a
    /// boundary port.
    pub fn parse(text: &'a str) -> Self {
        match text.split_once('.') {
            Some((actor, port)) => Endpoint::Actor { actor, port },
            None => Endpoint::Boundary(text),
        }
    }
}

/// A graph built from a description, with its scheduler settings.
#[derive(Debug)]
pub struct BuiltGraph {
    /// The constructed graph.
    pub graph: DataflowGraph,
    /// Settings from the `[scheduler]` table.
    pub config: SchedulerConfig,
}

impl BuiltGraph {
    /// Looks up an actor by name.
    pub fn actor(&self, name: &str) -> Option<ActorId> {
        self.graph.find_actor(name)
    }

    /// Looks up a port by endpoint text (`actor.port` or a boundary name).
    pub fn port(&self, endpoint: &str) -> Option<PortId> {
        match Endpoint::parse(endpoint) {
            Endpoint::Actor { actor, port } => {
                let actor = self.graph.find_actor(actor)?;
                self.graph.find_port(actor, port)
            }
            Endpoint::Boundary(name) => self.graph.find_boundary_port(name),
        }
    }
}

impl GraphDescription {
    /// Create a new empty description.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            scheduler: SchedulerConfig::default(),
            boundary: Vec::new(),
            actors: Vec::new(),
            connections: Vec::new(),
        }
    }

    /// Set the description text.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the scheduler settings.
    pub fn with_scheduler(mut self, scheduler: SchedulerConfig) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Add a boundary port.
    pub fn with_boundary(mut self, port: PortDescription) -> Self {
        self.boundary.push(port);
        self
    }

    /// Add an actor.
    pub fn with_actor(mut self, actor: ActorDescription) -> Self {
        self.actors.push(actor);
        self
    }

    /// Add a connection.
    pub fn with_connection(mut self, connection: ConnectionDescription) -> Self {
        self.connections.push(connection);
        self
    }

    /// Load a description from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        Self::from_toml(&content)
    }

    /// Load a description from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Save the description to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))?;
        Ok(())
    }

    /// Convert the description to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check names, endpoints, and directions.
    pub fn validate(&self) -> ValidationResult<()> {
        validate_description(self)
    }

    /// Validate, then construct the graph.
    pub fn build(&self) -> Result<BuiltGraph, ConfigError> {
        self.validate()?;

        let mut graph = DataflowGraph::new(self.name.as_str());
        for port in &self.boundary {
            let id = graph.add_boundary_port(port.name.as_str(), port.direction)?;
            port.apply(&mut graph, id)?;
        }
        for actor in &self.actors {
            let id = graph.add_actor(actor.name.as_str());
            for port in &actor.ports {
                let port_id = graph.add_port(id, port.name.as_str(), port.direction)?;
                port.apply(&mut graph, port_id)?;
            }
        }

        for (index, connection) in self.connections.iter().enumerate() {
            let name = connection
                .name
                .clone()
                .unwrap_or_else(|| format!("ch{index}"));
            let channel = graph.add_channel(name);
            for endpoint in std::iter::once(&connection.from).chain(&connection.to) {
                let port = lookup(&graph, endpoint)
                    .ok_or_else(|| ValidationError::UnknownEndpoint(endpoint.clone()))?;
                graph.link(port, channel)?;
            }
        }

        Ok(BuiltGraph {
            graph,
            config: self.scheduler.clone(),
        })
    }

    /// Number of actors.
    pub fn len(&self) -> usize {
        self.actors.len()
    }

    /// Whether the description has no actors.
    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }
}

fn lookup(graph: &DataflowGraph, endpoint: &str) -> Option<PortId> {
    match Endpoint::parse(endpoint) {
        Endpoint::Actor { actor, port } => graph.find_port(graph.find_actor(actor)?, port),
        Endpoint::Boundary(name) => graph.find_boundary_port(name),
    }
}

impl ActorDescription {
    /// Create an actor with no ports.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ports: Vec::new(),
        }
    }

    /// Add a port.
    pub fn with_port(mut self, port: PortDescription) -> Self {
        self.ports.push(port);
        self
    }
}

impl PortDescription {
    /// Create a port with default rates.
    pub fn new(name: impl Into<String>, direction: PortDirection) -> Self {
        Self {
            name: name.into(),
            direction,
            rate: None,
            init_rate: None,
            dynamic: false,
        }
    }

    /// Create an input port.
    pub fn input(name: impl Into<String>) -> Self {
        Self::new(name, PortDirection::Input)
    }

    /// Create an output port.
    pub fn output(name: impl Into<String>) -> Self {
        Self::new(name, PortDirection::Output)
    }

    /// Set tokens per firing.
    pub fn with_rate(mut self, rate: u32) -> Self {
        self.rate = Some(rate);
        self
    }

    /// Set initial tokens.
    pub fn with_init_rate(mut self, tokens: u32) -> Self {
        self.init_rate = Some(tokens);
        self
    }

    /// Mark the rate as changeable at runtime.
    pub fn dynamic(mut self) -> Self {
        self.dynamic = true;
        self
    }

    fn apply(&self, graph: &mut DataflowGraph, id: PortId) -> Result<(), ConfigError> {
        if let Some(rate) = self.rate {
            graph.set_rate(id, rate)?;
        }
        if let Some(tokens) = self.init_rate {
            graph.set_init_rate(id, tokens)?;
        }
        if self.dynamic {
            graph.mark_dynamic(id, true)?;
        }
        Ok(())
    }
}

impl ConnectionDescription {
    /// Create a connection from one endpoint to several.
    pub fn new<I, S>(from: impl Into<String>, to: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            from: from.into(),
            to: to.into_iter().map(Into::into).collect(),
            name: None,
        }
    }

    /// Name the channel.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}
