//! Graph descriptions for the cadence dataflow scheduler.
//!
//! Dataflow graphs can be written as TOML files, checked, and turned into a
//! [`cadence_core::DataflowGraph`] ready for scheduling. A set of sample
//! graphs ships with the crate.
//!
//! # Features
//!
//! - **Descriptions**: Load and save graphs as TOML
//! - **Validation**: Unique names, known endpoints, compatible directions
//! - **Sample Graphs**: Built-in graphs for common scheduling shapes
//!
//! # Example
//!
//! ```rust
//! use cadence_config::GraphDescription;
//! use cadence_core::Scheduler;
//!
//! let description = GraphDescription::from_toml(r#"
//! name = "pair"
//!
//! [[actors]]
//! name = "p"
//! [[actors.ports]]
//! name = "out"
//! direction = "output"
//!
//! [[actors]]
//! name = "c"
//! [[actors.ports]]
//! name = "in"
//! direction = "input"
//! rate = 2
//!
//! [[connections]]
//! from = "p.out"
//! to = ["c.in"]
//! "#).unwrap();
//!
//! let mut built = description.build().unwrap();
//! let scheduler = Scheduler::new(built.config.clone());
//! let result = scheduler.schedule(&mut built.graph).unwrap();
//! assert_eq!(result.repetitions.get(built.actor("p").unwrap()), 2);
//! ```

mod description;
mod error;

/// Description validation.
pub mod validation;

/// Sample graphs bundled with the library.
pub mod sample_graphs;

pub use description::{
    ActorDescription, BuiltGraph, ConnectionDescription, Endpoint, GraphDescription,
    PortDescription,
};
pub use error::ConfigError;
pub use sample_graphs::{
    SAMPLE_GRAPH_NAMES, get_sample_graph, is_sample_graph, sample_graph_names, sample_graphs,
};
pub use validation::{ValidationError, ValidationResult};
