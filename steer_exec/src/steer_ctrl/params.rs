//! Steering control parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;
use thiserror::Error;

// Internal
use super::{Gains, Term};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for steering control
#[derive(Deserialize, Debug, Clone, Default)]
pub struct Params {
    /// Gains the controller starts from. Tuning always begins here, tuned
    /// gains are never carried over from a previous session.
    pub initial_gains: Gains,

    /// Gain auto-tuning parameters
    pub tuning: TuningParams,
}

/// Parameters for the twiddle gain tuner
#[derive(Deserialize, Debug, Clone)]
pub struct TuningParams {
    /// If false the gains are never changed.
    pub enabled: bool,

    /// Number of ticks to let the system settle after a gain change, during
    /// which the error is not counted.
    pub num_settle_steps: usize,

    /// Number of ticks over which the cost of a set of gains is measured.
    pub num_eval_steps: usize,

    /// How the cost of each tick is computed from the error.
    pub cost_metric: CostMetric,

    /// The initial step size of each gain is the gain divided by this value.
    #[serde(default = "default_delta_divisor")]
    pub delta_divisor: f64,

    /// Explicit initial step sizes, overriding `delta_divisor`.
    ///
    /// Needed when one of the initial gains is zero.
    #[serde(default)]
    pub initial_deltas: Option<Gains>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The per-tick cost accumulated over an evaluation window.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CostMetric {
    /// `cte^2`, punishes large excursions more heavily.
    SquaredError,

    /// `|cte|`, less sensitive to occasional spikes.
    AbsoluteError,
}

/// Invalid steering control parameters.
#[derive(Debug, Error, PartialEq)]
pub enum ParamsError {
    #[error("The number of settle steps must be greater than zero")]
    ZeroSettleSteps,

    #[error("The number of evaluation steps must be greater than zero")]
    ZeroEvalSteps,

    #[error("The delta divisor must be positive and finite, found {0}")]
    InvalidDeltaDivisor(f64),

    #[error("The initial {0} gain is not finite")]
    NonFiniteGain(Term),

    #[error("The initial {0} step size must be positive and finite, found {1}")]
    InvalidDelta(Term, f64),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Params {
    /// Check that the parameters describe a usable controller.
    pub fn validate(&self) -> Result<(), ParamsError> {
        if let Some(t) = self.initial_gains.first_non_finite() {
            return Err(ParamsError::NonFiniteGain(t));
        }

        self.tuning.validate(&self.initial_gains)
    }
}

impl TuningParams {
    /// Check the tuning parameters against the gains they will tune.
    ///
    /// Step sizes are only checked if tuning is enabled, so fixed gains of
    /// zero are allowed.
    pub fn validate(&self, initial_gains: &Gains) -> Result<(), ParamsError> {
        if self.num_settle_steps == 0 {
            return Err(ParamsError::ZeroSettleSteps);
        }
        if self.num_eval_steps == 0 {
            return Err(ParamsError::ZeroEvalSteps);
        }
        if !(self.delta_divisor.is_finite() && self.delta_divisor > 0.0) {
            return Err(ParamsError::InvalidDeltaDivisor(self.delta_divisor));
        }

        if self.enabled {
            let deltas = self.initial_deltas(initial_gains);
            for t in Term::ALL.iter() {
                let d = deltas.get(*t);
                if !(d.is_finite() && d > 0.0) {
                    return Err(ParamsError::InvalidDelta(*t, d));
                }
            }
        }

        Ok(())
    }

    /// The step sizes the tuner starts with.
    pub fn initial_deltas(&self, initial_gains: &Gains) -> Gains {
        match self.initial_deltas {
            Some(d) => d,
            None => Gains::new(
                initial_gains.k_p / self.delta_divisor,
                initial_gains.k_i / self.delta_divisor,
                initial_gains.k_d / self.delta_divisor,
            ),
        }
    }
}

impl Default for TuningParams {
    fn default() -> Self {
        Self {
            enabled: true,
            num_settle_steps: 100,
            num_eval_steps: 2000,
            cost_metric: CostMetric::SquaredError,
            delta_divisor: default_delta_divisor(),
            initial_deltas: None,
        }
    }
}

impl CostMetric {
    /// Cost contribution of a single error sample.
    pub fn cost(&self, cte: f64) -> f64 {
        match self {
            CostMetric::SquaredError => cte * cte,
            CostMetric::AbsoluteError => cte.abs(),
        }
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn default_delta_divisor() -> f64 {
    10.0
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
