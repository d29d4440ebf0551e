//! Ackermann controller demonstration executable.
//!
//! # Architecture
//!
//! Runs a [`Controller`] against a simulated vehicle ([`Plant`]):
//!
//!     - Initialise the session, logger and parameters
//!     - Start the controller thread and set the goal from the command line
//!     - Simulation loop at the simulation rate:
//!         - Apply the controller's latest command to the plant
//!         - Feed the plant's state back to the controller
//!         - Archive the goal, state and command
//!     - Stop the controller and report the final tracking error
//!
//! The trace is written to `arch/trace.csv` in the session directory.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{Report, eyre::{WrapErr, eyre}};
use log::{debug, info, warn};
use serde::Serialize;
use std::{
    path::PathBuf,
    thread,
    time::Instant
};
use structopt::StructOpt;

// Internal
use ackermann_lib::{
    limits::shortest_arc_to_turn,
    Controller, Params, Plant, PlantOptions, SharedParams
};
use util::{
    archive::{Archived, Archiver, ArchiveError},
    host,
    logger::{logger_init, LevelFilter},
    session::{self, Session},
    time::period_from_frequency
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Parameter file used when none is given on the command line.
const DEFAULT_PARAMS_FILE: &str = "ackermann.toml";

/// Period between progress reports.
const REPORT_PERIOD_S: f64 = 1.0;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Command line arguments.
#[derive(Debug, StructOpt)]
#[structopt(
    name = "ackermann_exec",
    about = "Drive a simulated Ackermann vehicle to a speed and heading goal"
)]
struct Args {
    /// Goal speed in meters/second
    #[structopt(long, default_value = "2.0", allow_hyphen_values = true)]
    speed: f64,

    /// Goal heading in radians
    #[structopt(long, default_value = "0.0", allow_hyphen_values = true)]
    heading: f64,

    /// Length of the run in seconds
    #[structopt(long, default_value = "10.0")]
    duration: f64,

    /// Simulation rate in Hz
    #[structopt(long = "sim-rate", default_value = "50.0")]
    sim_rate: f64,

    /// Amplitude of the uniform noise added to the simulated vehicle
    #[structopt(long, default_value = "0.0")]
    noise: f64,

    /// Seed of the simulation noise
    #[structopt(long, default_value = "0")]
    seed: u64,

    /// Parameter file to use instead of `params/ackermann.toml`
    #[structopt(long, parse(from_os_str))]
    params: Option<PathBuf>
}

/// One row of the simulation trace.
#[derive(Debug, Clone, Copy, Default, Serialize)]
struct TraceRecord {
    time_s: f64,
    goal_speed_ms: f64,
    goal_heading_rad: f64,
    speed_ms: f64,
    heading_rad: f64,
    throttle: f64,
    steering_rad: f64,
    steering_rate_rads: f64
}

/// Archived simulation trace.
struct Trace {
    record: TraceRecord,
    arch: Archiver
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Archived for Trace {
    fn write(&mut self) -> Result<(), ArchiveError> {
        self.arch.serialise(self.record)
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let args = Args::from_args();

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new(
        "ackermann_exec",
        "sessions"
    ).wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Debug, &session)
        .wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Ackermann Controller Executable\n");
    if let Some(h) = host::get_hostname() {
        info!("Running on: {}", h);
    }
    info!("Session directory: {:?}\n", session.session_root);
    debug!("CLI arguments: {:?}", args);

    if !args.duration.is_finite() || args.duration < 0.0 {
        return Err(eyre!("Duration must be non-negative, got {}", args.duration));
    }
    if !args.noise.is_finite() || args.noise < 0.0 {
        return Err(eyre!("Noise amplitude must be non-negative, got {}", args.noise));
    }
    let sim_period = period_from_frequency(args.sim_rate)
        .ok_or_else(|| eyre!("Invalid simulation rate {} Hz", args.sim_rate))?;
    let sim_dt = sim_period.as_secs_f64();

    // ---- LOAD PARAMETERS ----

    let params = match args.params {
        Some(ref path) => Params::load_from_path(path),
        None => Params::load(DEFAULT_PARAMS_FILE)
    }.wrap_err("Could not load controller parameters")?;

    info!(
        "Controller parameters loaded, control period {:.4} s",
        params.control_period_s()
    );
    debug!("{:#?}", params);

    // ---- INITIALISE MODULES ----

    let mut plant_opts = PlantOptions::from_params(&params);
    plant_opts.noise_amplitude = args.noise;
    plant_opts.seed = args.seed;
    let mut plant = Plant::new(plant_opts)
        .wrap_err("Invalid simulation options")?;

    let mut trace = Trace {
        record: TraceRecord::default(),
        arch: Archiver::from_path(&session, "trace.csv")
            .wrap_err("Failed to create the trace archive")?
    };

    let shared_params = SharedParams::new(params)
        .wrap_err("Invalid controller parameters")?;
    let ctrl = Controller::new(shared_params);

    ctrl.set_goal(args.speed, args.heading);
    ctrl.start().wrap_err("Failed to start the controller")?;

    info!(
        "Driving to {:.3} m/s, {:.3} rad for {:.1} s\n",
        args.speed, args.heading, args.duration
    );

    // ---- MAIN LOOP ----

    let start_instant = Instant::now();
    let mut next_report_s = 0.0;
    let mut num_steps: u64 = 0;

    loop {
        let cycle_start_instant = Instant::now();
        let time_s = num_steps as f64 * sim_dt;

        if time_s > args.duration {
            break;
        }

        // Close the loop through the plant
        let command = ctrl.get_command();
        plant.command(command.throttle, command.steering_rad, sim_dt);

        let state = plant.get_state();
        ctrl.set_state(state.speed_ms, state.heading_rad);

        let goal = ctrl.get_goal();

        trace.record = TraceRecord {
            time_s,
            goal_speed_ms: goal.speed_ms,
            goal_heading_rad: goal.heading_rad,
            speed_ms: state.speed_ms,
            heading_rad: state.heading_rad,
            throttle: command.throttle,
            steering_rad: command.steering_rad,
            steering_rate_rads: command.steering_rate_rads
        };
        if let Err(e) = trace.write() {
            warn!("Could not write the trace: {}", e);
        }

        if time_s >= next_report_s {
            info!(
                "t = {:6.2} s: speed {:7.3} m/s, heading {:7.3} rad, \
                throttle {:5.3}, steering {:6.3} rad",
                time_s,
                state.speed_ms,
                state.heading_rad,
                command.throttle,
                command.steering_rad
            );
            next_report_s += REPORT_PERIOD_S;
        }

        num_steps += 1;

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;

        match sim_period.checked_sub(cycle_dur) {
            Some(d) => thread::sleep(d),
            None => warn!(
                "Simulation cycle overran by {:.06} s",
                cycle_dur.as_secs_f64() - sim_dt
            )
        }
    }

    // ---- SHUTDOWN ----

    ctrl.stop(true);

    let stats = ctrl.stats();
    let goal = ctrl.get_goal();
    let state = plant.get_state();

    info!(
        "Simulated {} steps in {:.2} s, controller ran {} cycles with {} timing violations",
        num_steps,
        start_instant.elapsed().as_secs_f64(),
        stats.ticks,
        stats.timing_violations
    );
    info!(
        "Final error: speed {:.4} m/s, heading {:.4} rad",
        goal.speed_ms - state.speed_ms,
        shortest_arc_to_turn(state.heading_rad, goal.heading_rad)
    );
    info!(
        "Session time {:.3} s, trace archived in {:?}",
        session::get_elapsed_seconds(),
        session.arch_root
    );

    info!("End of execution");

    Ok(())
}
