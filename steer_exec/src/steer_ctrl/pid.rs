//! # PID controller
//!
//! The controller keeps the running proportional, integral and derivative
//! error terms, and turns them into a normalised steering demand using a set
//! of gains it is handed on each call. The gains themselves are owned by the
//! tuner.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Magnitude limit of the steering demand, modelling the actuator's range.
pub const DEM_LIMIT: f64 = 1.0;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The three PID coefficients.
///
/// The same structure is used by the tuner to hold the per-gain step sizes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gains {
    /// Proportional gain
    pub k_p: f64,

    /// Integral gain
    pub k_i: f64,

    /// Derivative gain
    pub k_d: f64,
}

/// The running error terms of the controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PidErrors {
    /// The most recent error
    pub p_error: f64,

    /// Sum of all errors since the controller was created
    pub i_error: f64,

    /// Difference between the most recent error and the one before it
    pub d_error: f64,
}

/// A PID controller operating on the cross-track error, once per tick.
#[derive(Debug, Clone, Default)]
pub struct PidController {
    errors: PidErrors,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// One of the three terms of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Term {
    Proportional,
    Integral,
    Derivative,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Gains {
    pub fn new(k_p: f64, k_i: f64, k_d: f64) -> Self {
        Self { k_p, k_i, k_d }
    }

    /// Get the value associated with the given term.
    pub fn get(&self, term: Term) -> f64 {
        match term {
            Term::Proportional => self.k_p,
            Term::Integral => self.k_i,
            Term::Derivative => self.k_d,
        }
    }

    /// Get a mutable reference to the value associated with the given term.
    pub fn get_mut(&mut self, term: Term) -> &mut f64 {
        match term {
            Term::Proportional => &mut self.k_p,
            Term::Integral => &mut self.k_i,
            Term::Derivative => &mut self.k_d,
        }
    }

    /// Returns the first term whose value is not finite, if any.
    pub fn first_non_finite(&self) -> Option<Term> {
        Term::ALL.iter().copied().find(|t| !self.get(*t).is_finite())
    }
}

impl Default for Gains {
    fn default() -> Self {
        Self::new(0.2, 0.0001, 3.0)
    }
}

impl Term {
    /// All terms in tuning order.
    pub const ALL: [Term; 3] = [Term::Proportional, Term::Integral, Term::Derivative];
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Proportional => write!(f, "K_p"),
            Term::Integral => write!(f, "K_i"),
            Term::Derivative => write!(f, "K_d"),
        }
    }
}

impl PidController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update the error terms with a new cross-track error sample.
    ///
    /// The integral term is never reset or bounded.
    pub fn update(&mut self, cte: f64) {
        self.errors.d_error = cte - self.errors.p_error;
        self.errors.p_error = cte;
        self.errors.i_error += cte;
    }

    /// The demand before saturation.
    pub fn raw_dem(&self, gains: &Gains) -> f64 {
        -(gains.k_p * self.errors.p_error
            + gains.k_d * self.errors.d_error
            + gains.k_i * self.errors.i_error)
    }

    /// The steering demand for the current error terms, saturated to
    /// `[-DEM_LIMIT, DEM_LIMIT]`.
    pub fn command(&self, gains: &Gains) -> f64 {
        self.raw_dem(gains).clamp(-DEM_LIMIT, DEM_LIMIT)
    }

    /// Get a copy of the current error terms.
    pub fn errors(&self) -> PidErrors {
        self.errors
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn test_update_rules() {
        let mut pid = PidController::new();
        let ctes = [0.3, -1.2, 4.0, 0.0, 2.5, 2.5];

        let mut prev = 0.0;
        let mut sum = 0.0;
        for cte in ctes.iter() {
            pid.update(*cte);
            sum += cte;

            let e = pid.errors();
            assert_eq!(e.p_error, *cte);
            assert!((e.d_error - (cte - prev)).abs() < EPS);
            assert!((e.i_error - sum).abs() < EPS);

            prev = *cte;
        }
    }

    #[test]
    fn test_command_matches_formula_in_range() {
        let gains = Gains::new(0.2, 0.0001, 3.0);
        let mut pid = PidController::new();

        // Small errors keep the demand inside the limits
        pid.update(0.01);
        pid.update(0.02);

        let e = pid.errors();
        let expected = -(0.2 * e.p_error + 3.0 * e.d_error + 0.0001 * e.i_error);
        assert!(expected.abs() < DEM_LIMIT);
        assert_eq!(pid.command(&gains), expected);
        assert_eq!(pid.raw_dem(&gains), expected);
    }

    #[test]
    fn test_command_saturates() {
        let mut pid = PidController::new();
        pid.update(10.0);

        // Positive error gives a large negative demand
        let gains = Gains::new(1.0, 0.0, 0.0);
        assert_eq!(pid.raw_dem(&gains), -10.0);
        assert_eq!(pid.command(&gains), -DEM_LIMIT);

        // Negative gains flip it to the upper limit
        let gains = Gains::new(-1.0, 0.0, 0.0);
        assert_eq!(pid.command(&gains), DEM_LIMIT);

        // Exactly on the limit is not altered
        let gains = Gains::new(0.1, 0.0, 0.0);
        assert_eq!(pid.command(&gains), -1.0);
    }

    #[test]
    fn test_command_always_bounded() {
        let gain_sets = [
            Gains::new(0.2, 0.0001, 3.0),
            Gains::new(1e6, -1e3, 42.0),
            Gains::new(-5.0, 5.0, -5.0),
            Gains::new(0.0, 0.0, 0.0),
        ];

        let mut pid = PidController::new();
        for i in 0..200 {
            let cte = ((i as f64) * 0.37).sin() * (i as f64) * 0.1;
            pid.update(cte);

            for g in gain_sets.iter() {
                let dem = pid.command(g);
                assert!(dem >= -DEM_LIMIT && dem <= DEM_LIMIT);

                let raw = pid.raw_dem(g);
                if raw.abs() <= DEM_LIMIT {
                    assert_eq!(dem, raw);
                }
            }
        }
    }

    #[test]
    fn test_scenario_default_gains() {
        let gains = Gains::new(0.2, 0.0001, 3.0);
        let mut pid = PidController::new();

        let ctes = [0.5, 0.3, -0.1];
        let integrals = [0.5, 0.8, 0.7];
        let derivatives = [0.5, -0.2, -0.4];

        for i in 0..3 {
            pid.update(ctes[i]);
            let e = pid.errors();
            assert!((e.i_error - integrals[i]).abs() < EPS);
            assert!((e.d_error - derivatives[i]).abs() < EPS);

            let expected = (-(0.2 * ctes[i] + 3.0 * derivatives[i] + 0.0001 * integrals[i]))
                .clamp(-1.0, 1.0);
            assert!((pid.command(&gains) - expected).abs() < EPS);
        }
    }

    #[test]
    fn test_gains_access() {
        let mut g = Gains::new(1.0, 2.0, 3.0);
        *g.get_mut(Term::Integral) += 0.5;
        assert_eq!(g.get(Term::Proportional), 1.0);
        assert_eq!(g.get(Term::Integral), 2.5);
        assert_eq!(g.get(Term::Derivative), 3.0);
        assert_eq!(g.first_non_finite(), None);

        g.k_d = std::f64::NAN;
        assert_eq!(g.first_non_finite(), Some(Term::Derivative));
    }
}
