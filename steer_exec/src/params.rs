//! # Steering Executable Parameters
//!
//! This module provide parameters for the steering executable.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Deserialize, Debug)]
pub struct SteerExecParams {

    /// Constant throttle demand sent back to the simulator with every steering command
    pub throttle: f64,

    /// Number of ticks between progress reports in simulated plant mode
    pub sim_report_period_ticks: u64
}
