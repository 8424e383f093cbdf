//! # Simulator link messages
//!
//! The executable exchanges line-delimited JSON with an external driving
//! simulator. Each incoming line is a telemetry message carrying at least
//! the cross-track error, each outgoing line is a steering command.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Telemetry from the simulator. Unknown fields are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Telemetry {
    /// Cross-track error
    pub cte: f64,

    /// Vehicle speed
    #[serde(default)]
    pub speed: Option<f64>,

    /// The steering angle currently applied by the simulator
    #[serde(default)]
    pub steering_angle: Option<f64>,
}

/// Command sent back to the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SteerMsg {
    /// Normalised steering angle demand, in `[-1, 1]`
    pub steering_angle: f64,

    /// Normalised throttle demand
    pub throttle: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors in the simulator link messages
#[derive(Debug, Error)]
pub enum MsgError {
    #[error("The message is empty")]
    Empty,

    #[error("Cannot parse the message: {0}")]
    Json(serde_json::Error),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Parse a single line of telemetry.
pub fn parse_telemetry(line: &str) -> Result<Telemetry, MsgError> {
    let line = line.trim();

    if line.is_empty() {
        return Err(MsgError::Empty);
    }

    serde_json::from_str(line).map_err(MsgError::Json)
}

/// Format a steering command as a single line (without the newline).
pub fn format_steer_msg(msg: &SteerMsg) -> Result<String, MsgError> {
    serde_json::to_string(msg).map_err(MsgError::Json)
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
