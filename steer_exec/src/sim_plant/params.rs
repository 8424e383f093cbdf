//! Simulated plant parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters of the kinematic bicycle plant and its reference path.
#[derive(Deserialize, Debug, Clone)]
pub struct Params {
    /// Constant forward speed of the vehicle.
    ///
    /// Units: meters/second
    pub speed_ms: f64,

    /// Distance between the front and rear axles.
    ///
    /// Units: meters
    pub wheelbase_m: f64,

    /// Steer angle reached at a normalised demand of 1.
    ///
    /// Units: radians
    pub max_steer_rad: f64,

    /// Time step of one tick.
    ///
    /// Units: seconds
    pub period_s: f64,

    /// Amplitude of the sinusoidal reference path. Zero gives a straight
    /// path along the X axis.
    ///
    /// Units: meters
    pub path_amplitude_m: f64,

    /// Wavelength of the sinusoidal reference path.
    ///
    /// Units: meters
    pub path_wavelength_m: f64,

    /// Starting lateral offset from the path.
    ///
    /// Units: meters
    pub initial_offset_m: f64,

    /// Starting heading, measured from the X axis.
    ///
    /// Units: radians
    pub initial_heading_rad: f64,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            speed_ms: 10.0,
            wheelbase_m: 2.67,
            max_steer_rad: 25f64.to_radians(),
            period_s: 0.05,
            path_amplitude_m: 5.0,
            path_wavelength_m: 200.0,
            initial_offset_m: 1.0,
            initial_heading_rad: 0.0,
        }
    }
}
