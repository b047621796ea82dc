//! Integration test suite for taskplan.
//!
//! These tests drive the public API end to end: projects are built or
//! loaded from a store, ordered, simulated and summarized.
//!
//! # Test Categories
//!
//! - `scheduling`: Ordering properties of the topological scheduler
//! - `simulation_e2e`: Full simulation runs through the service
//! - `decomposition`: Request decomposition into a simulated project
//! - `persistence`: JSON file store round trips feeding simulations
//!
//! # CI Compatibility
//!
//! All oracles are scripted in-process; nothing touches the network.


mod decomposition;
mod persistence;
mod scheduling;
mod simulation_e2e;
