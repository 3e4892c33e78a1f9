//! Error types for scheduling and channel operations.
//!
//! Scheduling errors are plain values: a kind, a message, and the names of
//! the actors and ports involved. Callers decide how to surface them.

use thiserror::Error;

/// Why a graph is structurally unschedulable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuralReason {
    /// Some actors are unreachable from the rest and disconnected graphs are
    /// not allowed.
    Disconnected,
    /// Two producers feed one channel.
    NonDeterministicMerge,
    /// A port is declared as both input and output.
    BidirectionalPort,
    /// A port is declared as neither input nor output.
    UndirectedPort,
}

/// Coarse classification of a [`ScheduleError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The graph cannot be scheduled as wired.
    Structural,
    /// Rates do not balance, or a rate may change at runtime.
    RateInconsistency,
    /// The simulation ran out of ready actors with firings outstanding.
    Deadlock,
    /// A channel exceeded its inferred capacity during execution.
    CapacityViolation,
    /// A replayed firing found fewer tokens than it needed.
    ReplayUnderflow,
}

/// Errors produced by scheduling and by replaying a schedule.
///
/// None of these are retried. The caller changes the graph or its rates and
/// schedules again; a failed pass never touches the cache.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    /// The graph is wired in a way no schedule can satisfy.
    #[error("structural error: {message}")]
    Structural {
        /// What is wrong.
        reason: StructuralReason,
        /// Human-readable description.
        message: String,
        /// Names of the actors involved.
        actors: Vec<String>,
        /// Full names of the ports involved.
        ports: Vec<String>,
    },

    /// Rate propagation reached the same actor or port with two different ratios.
    #[error("rate inconsistency: {message}")]
    RateInconsistency {
        /// Human-readable description.
        message: String,
        /// Names of the actors involved.
        actors: Vec<String>,
        /// Full names of the ports involved.
        ports: Vec<String>,
    },

    /// No actor is ready but some still have firings remaining.
    #[error("deadlock: {message}")]
    Deadlock {
        /// Human-readable description.
        message: String,
        /// Actors with firings remaining.
        actors: Vec<String>,
    },

    /// A channel held more tokens than its inferred capacity.
    #[error("channel '{channel}' exceeded its capacity of {capacity} tokens")]
    CapacityViolation {
        /// Channel name.
        channel: String,
        /// Inferred capacity.
        capacity: u64,
    },

    /// A replayed firing tried to take from an empty channel.
    #[error("actor '{actor}' found channel '{channel}' empty on port '{port}'")]
    ReplayUnderflow {
        /// Actor that fired.
        actor: String,
        /// Full name of the starved input port.
        port: String,
        /// Channel name.
        channel: String,
    },
}

impl ScheduleError {
    /// Returns the error's kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Structural { .. } => ErrorKind::Structural,
            Self::RateInconsistency { .. } => ErrorKind::RateInconsistency,
            Self::Deadlock { .. } => ErrorKind::Deadlock,
            Self::CapacityViolation { .. } => ErrorKind::CapacityViolation,
            Self::ReplayUnderflow { .. } => ErrorKind::ReplayUnderflow,
        }
    }

    /// Names of the actors involved.
    pub fn actors(&self) -> &[String] {
        match self {
            Self::Structural { actors, .. }
            | Self::RateInconsistency { actors, .. }
            | Self::Deadlock { actors, .. } => actors,
            Self::ReplayUnderflow { actor, .. } => std::slice::from_ref(actor),
            Self::CapacityViolation { .. } => &[],
        }
    }

    /// Full names of the ports involved.
    pub fn ports(&self) -> &[String] {
        match self {
            Self::Structural { ports, .. } | Self::RateInconsistency { ports, .. } => ports,
            Self::ReplayUnderflow { port, .. } => std::slice::from_ref(port),
            Self::Deadlock { .. } | Self::CapacityViolation { .. } => &[],
        }
    }

    /// Returns the structural reason, if this is a structural error.
    pub fn structural_reason(&self) -> Option<StructuralReason> {
        match self {
            Self::Structural { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    pub(crate) fn structural(
        reason: StructuralReason,
        message: impl Into<String>,
        actors: Vec<String>,
        ports: Vec<String>,
    ) -> Self {
        Self::Structural {
            reason,
            message: message.into(),
            actors,
            ports,
        }
    }

    pub(crate) fn rate_inconsistency(
        message: impl Into<String>,
        actors: Vec<String>,
        ports: Vec<String>,
    ) -> Self {
        Self::RateInconsistency {
            message: message.into(),
            actors,
            ports,
        }
    }
}

/// Errors from [`Channel`](crate::Channel) operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// Take on an empty channel, or a batch larger than the channel holds.
    #[error("channel is empty")]
    Empty,
    /// Peek offset outside the live items or the history.
    #[error("offset {offset} is out of range")]
    OutOfRange {
        /// Requested offset.
        offset: isize,
    },
    /// The channel holds more items than the requested capacity.
    #[error("cannot set capacity to {requested}: channel holds {len} items")]
    CapacityTooSmall {
        /// Requested capacity.
        requested: usize,
        /// Items currently held.
        len: usize,
    },
}
