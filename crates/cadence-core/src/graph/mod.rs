//! Graph model for the synchronous dataflow scheduler.
//!
//! A [`DataflowGraph`] holds actors, their directional ports, and the channels
//! linking producer ports to consumer ports. Ports may also sit on the graph's
//! own boundary, which lets an enclosing scope treat the whole graph as one
//! multirate actor once it has been scheduled.
//!
//! The graph is read-only from the scheduler's point of view. The only values
//! the scheduler writes back are recorded results: inferred boundary rates,
//! channel capacities under buffer constraining, and firings per iteration.
//!
//! # Example
//!
//! ```rust
//! use cadence_core::graph::DataflowGraph;
//!
//! let mut graph = DataflowGraph::new("top");
//! let producer = graph.add_actor("producer");
//! let consumer = graph.add_actor("consumer");
//! let out = graph.add_output(producer, "out").unwrap();
//! let input = graph.add_input(consumer, "in").unwrap();
//! graph.set_rate(input, 2).unwrap();
//! graph.connect(out, input).unwrap();
//! assert_eq!(graph.channel_count(), 1);
//! ```

mod dataflow;
pub mod edge;
pub mod node;
pub mod port;

pub use dataflow::{DataflowGraph, GraphError, TopologyStamp};
pub use edge::ChannelId;
pub use node::ActorId;
pub use port::{PortDirection, PortId, PortOwner};
