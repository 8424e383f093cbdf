//! Implementations for the SteerCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{info, trace};
use serde::Serialize;
use std::path::PathBuf;

// Internal
use super::{
    Coordinate, Params, Phase, PidController, SteerCtrlError, Tuner, TuningRecord, DEM_LIMIT,
};
use util::{
    archive::{ArchiveError, Archived, Archiver},
    module::State,
    params,
    session::Session,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Steering control module state
#[derive(Default)]
pub struct SteerCtrl {
    pub(crate) params: Params,

    controller: PidController,
    tuner: Tuner,

    pub(crate) report: StatusReport,
    arch_report: Archiver,

    /// Window adjustments which haven't been archived yet, oldest first.
    pending_records: Vec<TuningRecord>,
    arch_tuning: Archiver,
}

/// Input data to Steering Control.
#[derive(Clone, Copy, Debug, Default)]
pub struct InputData {
    /// The cross-track error for this tick.
    ///
    /// Positive when the vehicle is to the left of the reference path.
    pub cte: f64,
}

/// Output demand from SteerCtrl for the steering actuator.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct OutputData {
    /// Normalised steering demand, between -1 (full right) and +1 (full
    /// left).
    pub steer_dem: f64,
}

/// Status report for SteerCtrl processing.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct StatusReport {
    pub cte: f64,

    pub p_error: f64,
    pub i_error: f64,
    pub d_error: f64,

    /// Gains used to compute this tick's demand
    pub k_p: f64,
    pub k_i: f64,
    pub k_d: f64,

    /// The demand before saturation
    pub raw_steer_dem: f64,

    /// True if the demand had to be saturated
    pub steer_dem_limited: bool,

    pub phase: Phase,
    pub coordinate: Coordinate,

    /// True if the gains were adjusted on this tick
    pub gains_adjusted: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for StatusReport {
    fn default() -> Self {
        Self {
            cte: 0.0,
            p_error: 0.0,
            i_error: 0.0,
            d_error: 0.0,
            k_p: 0.0,
            k_i: 0.0,
            k_d: 0.0,
            raw_steer_dem: 0.0,
            steer_dem_limited: false,
            phase: Phase::Settling,
            coordinate: Coordinate::IncreaseKp,
            gains_adjusted: false,
        }
    }
}

impl State for SteerCtrl {
    type InitData = PathBuf;
    type InitError = SteerCtrlError;

    type InputData = InputData;
    type OutputData = OutputData;
    type StatusReport = StatusReport;
    type ProcError = SteerCtrlError;

    /// Initialise the SteerCtrl module.
    ///
    /// Expected init data is the parameter file, either a file name in the
    /// `params` directory or a path to the file.
    fn init(&mut self, init_data: Self::InitData, session: &Session)
        -> Result<(), Self::InitError>
    {
        // Load the parameters
        let params: Params = params::load_file(&init_data)
            .map_err(SteerCtrlError::ParamLoadError)?;

        *self = Self::new(params)?;

        // Initialise the archivers
        self.arch_report = Archiver::from_path(
            session, "steer_ctrl/status_report.csv"
        ).map_err(SteerCtrlError::ArchiveInitError)?;
        self.arch_tuning = Archiver::from_path(
            session, "steer_ctrl/tuning.csv"
        ).map_err(SteerCtrlError::ArchiveInitError)?;

        Ok(())
    }

    /// Perform cyclic processing of Steering Control.
    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>
    {
        if !input_data.cte.is_finite() {
            return Err(SteerCtrlError::NonFiniteCte(input_data.cte));
        }

        let steer_dem = self.on_cte(input_data.cte);

        Ok((OutputData { steer_dem }, self.report))
    }
}

impl Archived for SteerCtrl {
    fn write(&mut self) -> Result<(), ArchiveError> {
        self.arch_report.serialise(self.report)?;

        for r in self.pending_records.drain(..) {
            self.arch_tuning.serialise(r)?;
        }

        Ok(())
    }
}

impl SteerCtrl {
    /// Build the module from already loaded parameters.
    ///
    /// No archives are opened, `init` must be used for that.
    pub fn new(params: Params) -> Result<Self, SteerCtrlError> {
        params.validate().map_err(SteerCtrlError::InvalidParams)?;

        let tuner = Tuner::new(params.initial_gains, &params.tuning)
            .map_err(SteerCtrlError::InvalidParams)?;

        info!(
            "SteerCtrl initial gains: K_p = {}, K_i = {}, K_d = {}",
            params.initial_gains.k_p, params.initial_gains.k_i, params.initial_gains.k_d
        );
        if tuner.is_enabled() {
            info!(
                "Twiddle tuning enabled ({} settle steps, {} eval steps, {:?})",
                params.tuning.num_settle_steps,
                params.tuning.num_eval_steps,
                params.tuning.cost_metric
            );
        } else {
            info!("Twiddle tuning disabled, gains are fixed");
        }

        Ok(Self {
            params,
            controller: PidController::new(),
            tuner,
            report: StatusReport::default(),
            arch_report: Archiver::default(),
            pending_records: Vec::new(),
            arch_tuning: Archiver::default(),
        })
    }

    /// Process one cross-track error sample and return the steering demand.
    ///
    /// The error terms are updated first, then the tuner runs, and the demand
    /// is computed from whatever gains the tuner holds afterwards. Tuning
    /// records are held until the next call to `write`.
    pub fn on_cte(&mut self, cte: f64) -> f64 {
        self.controller.update(cte);

        let record = self.tuner.tick(cte);
        if let Some(r) = record {
            info!(
                "Twiddle window {}: tried {:?}, cost {:.6}, best {:.6}, \
                 K_p = {:.6}, K_i = {:.6}, K_d = {:.6}, next {:?}",
                r.window,
                r.coordinate_tried,
                r.accumulated_cost,
                r.best_cost,
                r.k_p,
                r.k_i,
                r.k_d,
                r.next_coordinate
            );
            self.pending_records.push(r);
        }

        let gains = *self.tuner.gains();
        let raw_steer_dem = self.controller.raw_dem(&gains);
        let steer_dem = self.controller.command(&gains);
        let errors = self.controller.errors();

        self.report = StatusReport {
            cte,
            p_error: errors.p_error,
            i_error: errors.i_error,
            d_error: errors.d_error,
            k_p: gains.k_p,
            k_i: gains.k_i,
            k_d: gains.k_d,
            raw_steer_dem,
            steer_dem_limited: raw_steer_dem.abs() > DEM_LIMIT,
            phase: self.tuner.phase(),
            coordinate: self.tuner.coordinate(),
            gains_adjusted: record.is_some(),
        };

        trace!("SteerCtrl cte {:.6} -> dem {:.6}", cte, steer_dem);

        steer_dem
    }

    /// The tuner holding the live gains.
    pub fn tuner(&self) -> &Tuner {
        &self.tuner
    }

    /// The controller holding the error terms.
    pub fn controller(&self) -> &PidController {
        &self.controller
    }

    pub fn params(&self) -> &Params {
        &self.params
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::steer_ctrl::{Gains, TuningParams, CostMetric, ParamsError};
    use std::path::Path;

    const EPS: f64 = 1e-12;

    const SHORT_WINDOW_PARAMS: &str = r#"
        [initial_gains]
        k_p = 0.2
        k_i = 0.0001
        k_d = 3.0

        [tuning]
        enabled = true
        num_settle_steps = 1
        num_eval_steps = 2
        cost_metric = "absolute_error"
    "#;

    /// A session rooted in a fresh temporary directory.
    fn test_session(name: &str) -> Session {
        let mut session_root = std::env::temp_dir();
        session_root.push(name);
        let _ = std::fs::remove_dir_all(&session_root);

        Session {
            arch_root: session_root.join("arch"),
            log_file_path: session_root.join("test.log"),
            session_root,
        }
    }

    fn read_csv(path: &Path) -> Vec<Vec<String>> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| l.split(',').map(String::from).collect())
            .collect()
    }

    fn assert_close(field: &str, expected: f64) {
        let value: f64 = field.parse().unwrap();
        assert!(
            (value - expected).abs() < 1e-9,
            "Expected {}, found {}", expected, value
        );
    }

    fn fixed_params() -> Params {
        Params {
            initial_gains: Gains::new(0.2, 0.0001, 3.0),
            tuning: TuningParams {
                enabled: false,
                ..TuningParams::default()
            },
        }
    }

    #[test]
    fn test_scenario_fixed_gains() {
        let mut sc = SteerCtrl::new(fixed_params()).unwrap();

        let ctes = [0.5, 0.3, -0.1];
        let integrals = [0.5, 0.8, 0.7];
        let derivatives = [0.5, -0.2, -0.4];

        for i in 0..3 {
            let (out, report) = sc.proc(&InputData { cte: ctes[i] }).unwrap();

            let raw = -(0.2 * ctes[i] + 3.0 * derivatives[i] + 0.0001 * integrals[i]);
            assert!((report.raw_steer_dem - raw).abs() < EPS);
            assert!((out.steer_dem - raw.clamp(-1.0, 1.0)).abs() < EPS);
            assert!((report.i_error - integrals[i]).abs() < EPS);
            assert!((report.d_error - derivatives[i]).abs() < EPS);
            assert_eq!(report.steer_dem_limited, raw.abs() > 1.0);
            assert!(!report.gains_adjusted);
        }

        // Gains never move without tuning
        assert_eq!(*sc.tuner().gains(), Gains::new(0.2, 0.0001, 3.0));
    }

    #[test]
    fn test_rejects_non_finite_cte() {
        let mut sc = SteerCtrl::new(fixed_params()).unwrap();

        match sc.proc(&InputData { cte: std::f64::NAN }) {
            Err(SteerCtrlError::NonFiniteCte(_)) => (),
            r => panic!("Expected NonFiniteCte, got {:?}", r.map(|(o, _)| o))
        }

        // Error terms untouched
        assert_eq!(sc.controller().errors().i_error, 0.0);
    }

    #[test]
    fn test_rejects_invalid_params() {
        let mut p = fixed_params();
        p.tuning.num_settle_steps = 0;

        match SteerCtrl::new(p) {
            Err(SteerCtrlError::InvalidParams(ParamsError::ZeroSettleSteps)) => (),
            Err(e) => panic!("Unexpected error {}", e),
            Ok(_) => panic!("Expected an error")
        }
    }

    #[test]
    fn test_demand_uses_adjusted_gains() {
        let p = Params {
            initial_gains: Gains::new(0.2, 0.0001, 3.0),
            tuning: TuningParams {
                enabled: true,
                num_settle_steps: 1,
                num_eval_steps: 1,
                cost_metric: CostMetric::SquaredError,
                ..TuningParams::default()
            },
        };
        let mut sc = SteerCtrl::new(p).unwrap();

        // First tick only settles
        sc.on_cte(0.1);
        assert!(!sc.report.gains_adjusted);

        // Second tick ends the window, K_p increase is kept and K_i is bumped
        let dem = sc.on_cte(0.1);
        assert!(sc.report.gains_adjusted);
        assert_eq!(sc.report.coordinate, Coordinate::IncreaseKi);

        let e = sc.controller().errors();
        let expected = -(0.22 * e.p_error + 3.0 * e.d_error + 0.00011 * e.i_error);
        assert!((dem - expected).abs() < EPS);
        assert!((sc.report.k_i - 0.00011).abs() < EPS);

        // The record is waiting to be archived
        assert_eq!(sc.pending_records.len(), 1);
    }

    #[test]
    fn test_init_archives_tuning_records() {
        // Parameters are found under the software root
        let mut sw_root = std::env::temp_dir();
        sw_root.push("steer_ctrl_test_sw_root");
        std::fs::create_dir_all(sw_root.join("params")).unwrap();
        std::fs::write(
            sw_root.join("params").join("steer_ctrl_test.toml"),
            SHORT_WINDOW_PARAMS
        ).unwrap();
        std::env::set_var(util::host::SW_ROOT_ENV_VAR, &sw_root);

        let session = test_session("steer_ctrl_test_init_session");
        let mut sc = SteerCtrl::default();
        sc.init(PathBuf::from("steer_ctrl_test.toml"), &session).unwrap();
        assert_eq!(sc.params().tuning.num_eval_steps, 2);

        // Three windows of one settle and two eval ticks. The first window
        // always improves, the next two are worse.
        let ctes = [0.5, 0.5, 0.5, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0];
        for cte in ctes.iter() {
            sc.proc(&InputData { cte: *cte }).unwrap();
            sc.write().unwrap();
        }

        let arch_dir = session.arch_root.join("steer_ctrl");

        let report = read_csv(&arch_dir.join("status_report.csv"));
        assert_eq!(report.len(), 1 + ctes.len());
        assert_eq!(report[0][0], "cte");

        let tuning = read_csv(&arch_dir.join("tuning.csv"));
        assert_eq!(tuning.len(), 4);
        assert_eq!(tuning[0], vec![
            "window", "coordinate_tried", "k_p", "k_i", "k_d",
            "accumulated_cost", "best_cost", "improved", "next_coordinate"
        ]);

        // Improved K_p increase, K_i increase applied for the next window
        let r = &tuning[1];
        assert_eq!((r[0].as_str(), r[1].as_str()), ("1", "IncreaseKp"));
        assert_close(&r[2], 0.22);
        assert_close(&r[3], 0.00011);
        assert_close(&r[4], 3.0);
        assert_close(&r[5], 1.0);
        assert_close(&r[6], 1.0);
        assert_eq!((r[7].as_str(), r[8].as_str()), ("true", "IncreaseKi"));

        // Failed K_i increase steps down past the start
        let r = &tuning[2];
        assert_eq!((r[0].as_str(), r[1].as_str()), ("2", "IncreaseKi"));
        assert_close(&r[3], 0.00009);
        assert_close(&r[5], 2.0);
        assert_close(&r[6], 1.0);
        assert_eq!((r[7].as_str(), r[8].as_str()), ("false", "DecreaseKi"));

        // Failed K_i decrease is reverted, K_d increase applied
        let r = &tuning[3];
        assert_eq!((r[0].as_str(), r[1].as_str()), ("3", "DecreaseKi"));
        assert_close(&r[2], 0.22);
        assert_close(&r[3], 0.0001);
        assert_close(&r[4], 3.3);
        assert_eq!((r[7].as_str(), r[8].as_str()), ("false", "IncreaseKd"));

        std::fs::remove_dir_all(&session.session_root).unwrap();
    }

    #[test]
    fn test_init_from_explicit_path() {
        let mut path = std::env::temp_dir();
        path.push("steer_ctrl_test_explicit.toml");
        std::fs::write(&path, SHORT_WINDOW_PARAMS.replace(
            "enabled = true", "enabled = false"
        )).unwrap();

        let session = test_session("steer_ctrl_test_explicit_session");
        let mut sc = SteerCtrl::default();
        sc.init(path.clone(), &session).unwrap();

        assert!(!sc.tuner().is_enabled());
        assert_eq!(sc.params().tuning.cost_metric, CostMetric::AbsoluteError);
        assert!(session.arch_root.join("steer_ctrl").join("tuning.csv").is_file());

        // A missing file is reported as such
        let missing = std::env::temp_dir().join("steer_ctrl_test_missing.toml");
        let _ = std::fs::remove_file(&missing);
        match SteerCtrl::default().init(missing, &session) {
            Err(SteerCtrlError::ParamLoadError(_)) => (),
            Err(e) => panic!("Unexpected error {}", e),
            Ok(_) => panic!("Expected an error")
        }

        std::fs::remove_file(&path).unwrap();
        std::fs::remove_dir_all(&session.session_root).unwrap();
    }

    #[test]
    fn test_records_kept_until_written() {
        let session = test_session("steer_ctrl_test_pending_session");
        let mut sc = SteerCtrl::new(toml::from_str(SHORT_WINDOW_PARAMS).unwrap()).unwrap();
        sc.arch_tuning = Archiver::from_path(&session, "tuning.csv").unwrap();

        // Two windows end before anything is written
        for _ in 0..6 {
            sc.on_cte(0.5);
        }
        assert_eq!(sc.pending_records.len(), 2);

        sc.arch_report = Archiver::from_path(&session, "status_report.csv").unwrap();
        sc.write().unwrap();
        assert!(sc.pending_records.is_empty());

        let tuning = read_csv(&session.arch_root.join("tuning.csv"));
        assert_eq!(tuning.len(), 3);
        assert_eq!(tuning[1][0], "1");
        assert_eq!(tuning[2][0], "2");

        std::fs::remove_dir_all(&session.session_root).unwrap();
    }

    #[test]
    fn test_write_without_archives_fails() {
        let mut sc = SteerCtrl::new(fixed_params()).unwrap();
        sc.on_cte(0.1);

        match sc.write() {
            Err(ArchiveError::NotInitialised) => (),
            r => panic!("Expected NotInitialised, got {:?}", r)
        }
    }
}
