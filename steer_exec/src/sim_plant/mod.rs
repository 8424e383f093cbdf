//! # Simulated plant
//!
//! A kinematic bicycle model driven along a sinusoidal reference path. It
//! stands in for the driving simulator so the controller and tuner can be
//! exercised offline.
//!
//! The cross-track error is taken as the vertical offset from the path,
//! `y - y_ref(x)`, which is close to the true perpendicular distance for
//! gently curving paths.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::f64::consts::TAU;
use nalgebra::Vector2;

pub use params::Params;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The simulated vehicle.
#[derive(Debug, Clone)]
pub struct SimPlant {
    params: Params,

    /// Position of the rear axle centre.
    ///
    /// Units: meters
    position_m: Vector2<f64>,

    /// Heading from the X axis, positive anticlockwise.
    ///
    /// Units: radians
    heading_rad: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SimPlant {
    /// Place a new vehicle at the start of the path, offset by the initial
    /// offset.
    pub fn new(params: Params) -> Self {
        let mut plant = Self {
            position_m: Vector2::new(0.0, 0.0),
            heading_rad: params.initial_heading_rad,
            params,
        };
        plant.position_m[1] = plant.reference_y(0.0) + plant.params.initial_offset_m;

        plant
    }

    /// Advance the vehicle by one tick with the given normalised steering
    /// demand.
    ///
    /// Demands outside `[-1, 1]` are saturated. A positive demand turns the
    /// vehicle anticlockwise.
    pub fn step(&mut self, steer_dem: f64) {
        let steer_rad = steer_dem.clamp(-1.0, 1.0) * self.params.max_steer_rad;
        let dt = self.params.period_s;
        let v = self.params.speed_ms;

        self.heading_rad += v / self.params.wheelbase_m * steer_rad.tan() * dt;
        self.position_m += Vector2::new(self.heading_rad.cos(), self.heading_rad.sin()) * v * dt;
    }

    /// The current cross-track error, positive when the vehicle is to the
    /// left of (above) the path.
    pub fn cte(&self) -> f64 {
        self.position_m[1] - self.reference_y(self.position_m[0])
    }

    /// The Y coordinate of the reference path at the given X.
    pub fn reference_y(&self, x_m: f64) -> f64 {
        if self.params.path_wavelength_m <= 0.0 {
            return 0.0;
        }

        self.params.path_amplitude_m * (TAU * x_m / self.params.path_wavelength_m).sin()
    }

    pub fn position_m(&self) -> &Vector2<f64> {
        &self.position_m
    }

    pub fn heading_rad(&self) -> f64 {
        self.heading_rad
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
