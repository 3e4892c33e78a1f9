//! Cadence Core - static scheduling for synchronous dataflow graphs
//!
//! Actors in a synchronous dataflow graph consume and produce a fixed number
//! of tokens per firing. This crate computes how often each actor must fire
//! per iteration so that every channel balances, and a concrete firing order
//! that never takes a token before it exists.
//!
//! # Core Abstractions
//!
//! ## Graph
//!
//! - [`DataflowGraph`] - Actors, directional ports, channels, boundary ports
//! - [`RateProvider`] - Where per-port rates come from
//! - [`ExternalRateSink`] - Where inferred boundary rates go
//!
//! ## Scheduling
//!
//! - [`BalanceSolver`] - Exact rational balance equations, normalized per cluster
//! - [`ScheduleBuilder`] - Token-flow simulation producing the firing order
//! - [`BufferSizeTracker`] - Per-channel high-water marks
//! - [`ScheduleCache`] - Results keyed by [`RateSignature`] with LRU retention
//! - [`Scheduler`] - The three composed behind one call
//!
//! ## Execution Support
//!
//! - [`Channel`] - Circular FIFO with optional capacity and history
//! - [`replay()`] - Executes a schedule on real channels and checks it
//!
//! # Example
//!
//! ```rust
//! use cadence_core::{DataflowGraph, Scheduler};
//!
//! // a -> b -> a, with one initial token on the feedback edge.
//! let mut graph = DataflowGraph::new("loop");
//! let a = graph.add_actor("a");
//! let b = graph.add_actor("b");
//! let a_out = graph.add_output(a, "out").unwrap();
//! let a_in = graph.add_input(a, "in").unwrap();
//! let b_in = graph.add_input(b, "in").unwrap();
//! let b_out = graph.add_output(b, "out").unwrap();
//! graph.connect(a_out, b_in).unwrap();
//! graph.connect(b_out, a_in).unwrap();
//! graph.set_init_rate(b_out, 1).unwrap();
//!
//! let result = Scheduler::default().schedule(&mut graph).unwrap();
//! assert_eq!(result.repetitions.get(a), 1);
//! assert_eq!(result.repetitions.get(b), 1);
//! ```
//!
//! # Logging
//!
//! With the `tracing` feature enabled the solver, builder, and cache emit
//! `debug` events. Without it no logging code is compiled.

pub mod balance;
pub mod builder;
pub mod cache;
pub mod channel;
pub mod config;
pub mod error;
pub mod graph;
pub mod rate;
pub mod replay;
pub mod schedule;
pub mod scheduler;

pub use balance::{BalanceSolution, BalanceSolver};
pub use builder::{BufferSizeTracker, BuiltSchedule, ScheduleBuilder};
pub use cache::ScheduleCache;
pub use channel::{Capacity, Channel, HistoryCapacity};
pub use config::SchedulerConfig;
pub use error::{ChannelError, ErrorKind, ScheduleError, StructuralReason};
pub use graph::{
    ActorId, ChannelId, DataflowGraph, GraphError, PortDirection, PortId, PortOwner,
    TopologyStamp,
};
pub use rate::{
    BoundaryRate, ExternalRateSink, ExternalRates, RateOverrides, RateProvider, RateSignature,
};
pub use replay::{CapacityPolicy, ReplayReport, Token, replay};
pub use schedule::{Firing, RepetitionVector, Schedule, ScheduleDisplay, ScheduleResult};
pub use scheduler::Scheduler;
