//! # Steering library.
//!
//! This library allows other crates in the workspace (and the benchmarks) to
//! access items defined inside the steering crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Simulator link - line-delimited JSON messages exchanged with the driving simulator
pub mod sim_link;

/// Simulated plant - kinematic vehicle model for running the controller offline
pub mod sim_plant;

/// Steering control module - PID steering with online twiddle gain tuning
pub mod steer_ctrl;
