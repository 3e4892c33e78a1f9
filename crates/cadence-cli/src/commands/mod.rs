//! CLI command implementations.

pub mod check;
pub mod common;
pub mod replay;
pub mod samples;
pub mod schedule;
