//! Dependency-aware task scheduling and round-based execution simulation.
//!
//! A [`core::Project`] holds a graph of tasks. The
//! [`orchestration::TopologicalScheduler`] orders it, the
//! [`orchestration::ExecutionEngine`] simulates typed agents working through
//! it in fixed time steps, and [`orchestration::metrics`] reports the result.

pub mod config;
pub mod core;
pub mod error;
pub mod log;
pub mod orchestration;
pub mod store;

pub use error::{Error, Result};
