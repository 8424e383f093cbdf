//! # Twiddle gain tuner
//!
//! The tuner searches for better controller gains while the controller is
//! running, by perturbing one gain at a time and scoring the result.
//!
//! Tuning proceeds in windows. Each window is made up of:
//!
//!  1. A settling phase of `num_settle_steps` ticks, in which transients from
//!     the last gain change die out. The error is not scored.
//!  1. An evaluation phase of `num_eval_steps` ticks, in which the cost of
//!     each tick's error is accumulated.
//!
//! At the end of each window the accumulated cost is compared against the
//! best cost seen so far, and the gain under test is either kept or moved,
//! according to the current `Coordinate`. Coordinates are visited in the
//! order `IncreaseKp, DecreaseKp, IncreaseKi, DecreaseKi, IncreaseKd,
//! DecreaseKd`, forever.
//!
//! The perturbation for a window is always applied before the window starts,
//! so the gains in effect during evaluation are the ones being scored.
//!
//! Note that an improving increase skips the paired decrease entirely and
//! moves straight on to increasing the next gain. The decrease is only tried
//! when the increase made things worse.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, trace};
use serde::Serialize;

// Internal
use super::{CostMetric, Gains, ParamsError, Term, TuningParams};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Step size multiplier applied when a perturbation improves the cost.
pub const DELTA_GROW: f64 = 1.1;

/// Step size multiplier applied when neither direction improved the cost.
pub const DELTA_SHRINK: f64 = 0.9;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The twiddle tuner, which owns the live controller gains.
#[derive(Debug, Clone)]
pub struct Tuner {
    enabled: bool,
    num_settle_steps: usize,
    num_eval_steps: usize,
    cost_metric: CostMetric,

    gains: Gains,
    deltas: Gains,

    phase: Phase,
    settle_tick_count: usize,
    eval_tick_count: usize,

    accumulated_cost: f64,
    best_cost: f64,

    coordinate: Coordinate,
    window_count: u64,
}

/// A record of one window-end adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TuningRecord {
    /// The number of the window which just completed, starting from 1.
    pub window: u64,

    /// The coordinate that was scored in the window.
    pub coordinate_tried: Coordinate,

    /// Proportional gain after the adjustment
    pub k_p: f64,

    /// Integral gain after the adjustment
    pub k_i: f64,

    /// Derivative gain after the adjustment
    pub k_d: f64,

    /// The cost accumulated over the window
    pub accumulated_cost: f64,

    /// The best cost after the adjustment
    pub best_cost: f64,

    /// True if the window beat the previous best cost
    pub improved: bool,

    /// The coordinate that will be scored in the next window
    pub next_coordinate: Coordinate,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The phase of the current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Settling,
    Evaluating,
}

/// The gain and direction under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Coordinate {
    IncreaseKp,
    DecreaseKp,
    IncreaseKi,
    DecreaseKi,
    IncreaseKd,
    DecreaseKd,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Coordinate {
    /// The next coordinate in the cycle.
    pub fn next(self) -> Self {
        match self {
            Coordinate::IncreaseKp => Coordinate::DecreaseKp,
            Coordinate::DecreaseKp => Coordinate::IncreaseKi,
            Coordinate::IncreaseKi => Coordinate::DecreaseKi,
            Coordinate::DecreaseKi => Coordinate::IncreaseKd,
            Coordinate::IncreaseKd => Coordinate::DecreaseKd,
            Coordinate::DecreaseKd => Coordinate::IncreaseKp,
        }
    }

    /// The gain this coordinate perturbs.
    pub fn term(self) -> Term {
        match self {
            Coordinate::IncreaseKp | Coordinate::DecreaseKp => Term::Proportional,
            Coordinate::IncreaseKi | Coordinate::DecreaseKi => Term::Integral,
            Coordinate::IncreaseKd | Coordinate::DecreaseKd => Term::Derivative,
        }
    }

    pub fn is_increase(self) -> bool {
        matches!(
            self,
            Coordinate::IncreaseKp | Coordinate::IncreaseKi | Coordinate::IncreaseKd
        )
    }
}

impl Default for Tuner {
    fn default() -> Self {
        Tuner::fixed(Gains::default())
    }
}

impl Tuner {
    /// Create a new tuner from validated parameters.
    ///
    /// If tuning is enabled the proportional gain is immediately increased by
    /// its step size, ready for the first window.
    pub fn new(initial_gains: Gains, params: &TuningParams) -> Result<Self, ParamsError> {
        params.validate(&initial_gains)?;

        let mut tuner = Self {
            enabled: params.enabled,
            num_settle_steps: params.num_settle_steps,
            num_eval_steps: params.num_eval_steps,
            cost_metric: params.cost_metric,
            gains: initial_gains,
            deltas: params.initial_deltas(&initial_gains),
            phase: Phase::Settling,
            settle_tick_count: 0,
            eval_tick_count: 0,
            accumulated_cost: 0.0,
            best_cost: std::f64::INFINITY,
            coordinate: Coordinate::IncreaseKp,
            window_count: 0,
        };

        if tuner.enabled {
            tuner.perturb_up(Coordinate::IncreaseKp.term());
        }

        Ok(tuner)
    }

    /// Create a tuner which never changes the given gains.
    pub fn fixed(gains: Gains) -> Self {
        let params = TuningParams {
            enabled: false,
            ..TuningParams::default()
        };

        Self {
            enabled: false,
            num_settle_steps: params.num_settle_steps,
            num_eval_steps: params.num_eval_steps,
            cost_metric: params.cost_metric,
            gains,
            deltas: params.initial_deltas(&gains),
            phase: Phase::Settling,
            settle_tick_count: 0,
            eval_tick_count: 0,
            accumulated_cost: 0.0,
            best_cost: std::f64::INFINITY,
            coordinate: Coordinate::IncreaseKp,
            window_count: 0,
        }
    }

    /// Run the tuner for one tick.
    ///
    /// Must be called after the controller's error terms have been updated
    /// with `cte`. Returns a record when a window has just ended and the gains
    /// were adjusted.
    pub fn tick(&mut self, cte: f64) -> Option<TuningRecord> {
        if !self.enabled {
            return None;
        }

        match self.phase {
            Phase::Settling => {
                self.settle_tick_count += 1;

                if self.settle_tick_count >= self.num_settle_steps {
                    trace!("Twiddle settled, evaluating {:?}", self.coordinate);
                    self.phase = Phase::Evaluating;
                    self.accumulated_cost = 0.0;
                }

                None
            }
            Phase::Evaluating => {
                self.accumulated_cost += self.cost_metric.cost(cte);
                self.eval_tick_count += 1;

                if self.eval_tick_count >= self.num_eval_steps {
                    let record = self.adjust();

                    self.phase = Phase::Settling;
                    self.settle_tick_count = 0;
                    self.eval_tick_count = 0;

                    Some(record)
                } else {
                    None
                }
            }
        }
    }

    pub fn gains(&self) -> &Gains {
        &self.gains
    }

    pub fn deltas(&self) -> &Gains {
        &self.deltas
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn coordinate(&self) -> Coordinate {
        self.coordinate
    }

    pub fn accumulated_cost(&self) -> f64 {
        self.accumulated_cost
    }

    pub fn best_cost(&self) -> f64 {
        self.best_cost
    }

    pub fn window_count(&self) -> u64 {
        self.window_count
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Score the window that just finished and move the gains for the next
    /// one.
    fn adjust(&mut self) -> TuningRecord {
        let tried = self.coordinate;
        let term = tried.term();
        let cost = self.accumulated_cost;
        let improved = cost < self.best_cost;

        if improved {
            self.best_cost = cost;
            *self.deltas.get_mut(term) *= DELTA_GROW;
        }

        self.coordinate = match (tried.is_increase(), improved) {
            // Keep the increase and skip the paired decrease
            (true, true) => self.begin_increase(tried.next().next()),

            // Try the other side of the baseline
            (true, false) => {
                let delta = self.deltas.get(term);
                *self.gains.get_mut(term) -= 2.0 * delta;
                tried.next()
            }

            (false, improved) => {
                if !improved {
                    // Back to the baseline, with a finer step next time
                    let delta = self.deltas.get(term);
                    *self.gains.get_mut(term) += delta;
                    *self.deltas.get_mut(term) *= DELTA_SHRINK;
                }
                self.begin_increase(tried.next())
            }
        };

        self.window_count += 1;

        debug!(
            "Twiddle window {} on {:?}: cost {:.6} (best {:.6}), next {:?}",
            self.window_count, tried, cost, self.best_cost, self.coordinate
        );

        TuningRecord {
            window: self.window_count,
            coordinate_tried: tried,
            k_p: self.gains.k_p,
            k_i: self.gains.k_i,
            k_d: self.gains.k_d,
            accumulated_cost: cost,
            best_cost: self.best_cost,
            improved,
            next_coordinate: self.coordinate,
        }
    }

    /// Apply the perturbation for an increase coordinate and return it.
    fn begin_increase(&mut self, coordinate: Coordinate) -> Coordinate {
        self.perturb_up(coordinate.term());
        coordinate
    }

    fn perturb_up(&mut self, term: Term) {
        let delta = self.deltas.get(term);
        *self.gains.get_mut(term) += delta;
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
