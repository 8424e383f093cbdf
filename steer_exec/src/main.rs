//! Steering executable entry point.
//!
//! # Architecture
//!
//! The executable runs the steering controller once per tick, in one of two
//! modes:
//!
//!     - Simulator link (default): telemetry is read as line-delimited JSON
//!       from stdin, and a steering command is written to stdout for each
//!       telemetry line. The loop ends when stdin is closed.
//!     - Simulated plant (`--sim`): a kinematic vehicle model provides the
//!       cross-track error and consumes the demand, for a fixed number of
//!       ticks.
//!
//! In both modes each tick consists of:
//!     - Cross-track error acquisition
//!     - SteerCtrl processing (error update, gain tuning, demand calculation)
//!     - Demand output
//!     - Archiving
//!
//! Logs are written to stderr and the session log file, never to stdout.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Report};
use log::{debug, info, warn};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use structopt::StructOpt;

// Internal
use params::SteerExecParams;
use steer_lib::{
    sim_link::{format_steer_msg, parse_telemetry, MsgError, SteerMsg},
    sim_plant::{self, SimPlant},
    steer_ctrl::{InputData, SteerCtrl, SteerCtrlError},
};
use util::{
    archive::Archived,
    logger::{logger_init, LevelFilter},
    module::State,
    session::Session,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Command line options
#[derive(Debug, StructOpt)]
#[structopt(name = "steer_exec", about = "PID steering with online twiddle gain tuning")]
struct Opt {
    /// Drive the simulated plant instead of reading telemetry from stdin
    #[structopt(long)]
    sim: bool,

    /// Number of ticks to run the simulated plant for
    #[structopt(long, default_value = "20000")]
    ticks: u64,

    /// SteerCtrl parameter file, either a file name in the params directory or
    /// a path to the file
    #[structopt(long, parse(from_os_str), default_value = "steer_ctrl.toml")]
    params: PathBuf,

    /// Log debug messages
    #[structopt(short, long)]
    verbose: bool,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let opt = Opt::from_args();

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("steer_exec", "sessions")
        .wrap_err("Failed to create the session")?;

    // Initialise logger
    let level = if opt.verbose { LevelFilter::Debug } else { LevelFilter::Info };
    logger_init(level, &session).wrap_err("Failed to initialise logging")?;

    info!("Steering Executable\n");
    info!("Session directory: {:?}\n", session.session_root);
    debug!("CLI options: {:?}", opt);

    // ---- LOAD PARAMETERS ----

    let exec_params: SteerExecParams = util::params::load("steer_exec.toml")
        .wrap_err("Could not load exec params")?;

    info!("Exec parameters loaded");

    // ---- INITIALISE MODULES ----

    info!("Initialising modules...");

    let mut steer_ctrl = SteerCtrl::default();
    steer_ctrl
        .init(opt.params.clone(), &session)
        .wrap_err("Failed to initialise SteerCtrl")?;
    info!("SteerCtrl init complete");

    info!("Module initialisation complete\n");

    // ---- MAIN LOOP ----

    if opt.sim {
        run_sim_plant(&mut steer_ctrl, &exec_params, opt.ticks)
    } else {
        run_sim_link(&mut steer_ctrl, &exec_params)
    }
}

/// Run the controller against telemetry from stdin, replying on stdout.
fn run_sim_link(
    steer_ctrl: &mut SteerCtrl,
    exec_params: &SteerExecParams,
) -> Result<(), Report> {
    info!("Waiting for telemetry on stdin\n");

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut num_ticks: u64 = 0;

    for line in stdin.lock().lines() {
        let line = line.wrap_err("Failed to read telemetry from stdin")?;

        let telem = match parse_telemetry(&line) {
            Ok(t) => t,
            Err(MsgError::Empty) => continue,
            Err(e) => {
                warn!("Skipping invalid telemetry: {}", e);
                continue;
            }
        };

        let (output, _) = match steer_ctrl.proc(&InputData { cte: telem.cte }) {
            Ok(o) => o,
            Err(e @ SteerCtrlError::NonFiniteCte(_)) => {
                warn!("Skipping telemetry: {}", e);
                continue;
            }
            Err(e) => return Err(e).wrap_err("Error during SteerCtrl processing"),
        };

        let msg = format_steer_msg(&SteerMsg {
            steering_angle: output.steer_dem,
            throttle: exec_params.throttle,
        })
        .wrap_err("Failed to format the steering command")?;

        writeln!(out, "{}", msg).wrap_err("Failed to write the steering command")?;
        out.flush().wrap_err("Failed to flush stdout")?;

        if let Err(e) = steer_ctrl.write() {
            warn!("Could not write SteerCtrl archives: {}", e);
        }

        num_ticks += 1;
    }

    info!("Telemetry stream closed after {} ticks", num_ticks);
    log_summary(steer_ctrl);

    Ok(())
}

/// Run the controller against the simulated plant for the given number of
/// ticks.
fn run_sim_plant(
    steer_ctrl: &mut SteerCtrl,
    exec_params: &SteerExecParams,
    num_ticks: u64,
) -> Result<(), Report> {
    let plant_params: sim_plant::Params = util::params::load("sim_plant.toml")
        .wrap_err("Could not load simulated plant params")?;
    let mut plant = SimPlant::new(plant_params);

    info!("Running simulated plant for {} ticks\n", num_ticks);

    let mut sum_sq_cte = 0.0;
    let mut period_sum_sq_cte = 0.0;

    for tick in 1..=num_ticks {
        let cte = plant.cte();

        let (output, _) = steer_ctrl
            .proc(&InputData { cte })
            .wrap_err("Error during SteerCtrl processing")?;

        plant.step(output.steer_dem);

        if let Err(e) = steer_ctrl.write() {
            warn!("Could not write SteerCtrl archives: {}", e);
        }

        sum_sq_cte += cte * cte;
        period_sum_sq_cte += cte * cte;

        if exec_params.sim_report_period_ticks > 0 && tick % exec_params.sim_report_period_ticks == 0 {
            info!(
                "Tick {}: RMS cte over last {} ticks {:.4} m",
                tick,
                exec_params.sim_report_period_ticks,
                (period_sum_sq_cte / exec_params.sim_report_period_ticks as f64).sqrt()
            );
            period_sum_sq_cte = 0.0;
        }
    }

    if num_ticks > 0 {
        info!(
            "Simulation complete, RMS cte {:.4} m",
            (sum_sq_cte / num_ticks as f64).sqrt()
        );
    }
    log_summary(steer_ctrl);

    Ok(())
}

/// Log the final state of the tuner.
fn log_summary(steer_ctrl: &SteerCtrl) {
    let tuner = steer_ctrl.tuner();
    let gains = tuner.gains();

    info!(
        "Final gains: K_p = {:.6}, K_i = {:.6}, K_d = {:.6}",
        gains.k_p, gains.k_i, gains.k_d
    );

    if tuner.is_enabled() {
        info!(
            "Completed {} tuning windows, best cost {:.6}",
            tuner.window_count(),
            tuner.best_cost()
        );
    }
}
