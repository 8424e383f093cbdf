//! # Steering control module
//!
//! Steering control converts the cross-track error (the lateral distance of
//! the vehicle from its reference path) into a normalised steering demand.
//! It does this with a PID controller whose gains are tuned online by a
//! twiddle (coordinate search) tuner.
//!
//! Each tick:
//!
//!  1. The controller's proportional, integral and derivative error terms are
//!     updated from the new cross-track error.
//!  1. The tuner scores the error and, at the end of an evaluation window,
//!     adjusts one gain.
//!  1. The controller computes the demand from the (possibly just adjusted)
//!     gains, saturated to `[-1, 1]`.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
mod pid;
mod state;
mod twiddle;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use params::*;
pub use pid::*;
pub use state::*;
pub use twiddle::*;

use util::{archive::ArchiveError, params::LoadError};

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during SteerCtrl operation.
#[derive(Debug, thiserror::Error)]
pub enum SteerCtrlError {
    #[error("Could not load parameters: {0}")]
    ParamLoadError(LoadError),

    #[error("Invalid parameters: {0}")]
    InvalidParams(ParamsError),

    #[error("Could not initialise the archives: {0}")]
    ArchiveInitError(ArchiveError),

    #[error("Received a non-finite cross-track error: {0}")]
    NonFiniteCte(f64),
}
