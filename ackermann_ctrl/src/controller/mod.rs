//! # Controller module
//!
//! The controller owns a [`Model`], a speed and a heading [`Pid`] and runs
//! them on a dedicated thread at the configured control frequency. All
//! accessors may be called from any thread while the loop is running.
//!
//! ```no_run
//! use ackermann_lib::{Controller, Params, SharedParams};
//!
//! let params = SharedParams::new(Params::new(2.5, 0.5, 1.0, 1.0)?)?;
//! let ctrl = Controller::new(params);
//!
//! ctrl.start()?;
//! ctrl.set_goal(2.0, 0.5);
//! // ... feed the measured state with ctrl.set_state(), read ctrl.get_command()
//! ctrl.stop(true);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod control_loop;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, error};
use parking_lot::Mutex;
use serde::Serialize;
use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc
    },
    thread::{self, JoinHandle}
};
use thiserror::Error;

// Internal
use crate::{
    model::{Command, Model, Setpoint, WheelSpeeds},
    params::{Params, SharedParams},
    pid::Pid
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Name given to the control loop thread.
const LOOP_THREAD_NAME: &str = "control_loop";

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Speed and heading controller for an Ackermann vehicle.
pub struct Controller {
    shared: Arc<Shared>,

    /// Handle to the control loop thread, `None` if never started or joined
    worker: Mutex<Option<JoinHandle<()>>>
}

/// Statistics of the control loop since the controller was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoopStats {
    /// Number of control cycles executed
    pub ticks: u64,

    /// Number of cycles whose period was outside the timing tolerance
    pub timing_violations: u64
}

/// State shared between the controller handle and its loop thread.
pub(crate) struct Shared {
    pub(crate) params: SharedParams,
    pub(crate) model: Model,
    pub(crate) pids: Mutex<PidPair>,

    pub(crate) stop: AtomicBool,
    pub(crate) ticks: AtomicU64,
    pub(crate) timing_violations: AtomicU64
}

/// The two control axes, locked together so a reset never splits a cycle.
pub(crate) struct PidPair {
    pub(crate) speed: Pid,
    pub(crate) heading: Pid
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Lifecycle state of the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LoopState {
    /// No loop thread is running
    Idle,

    /// The loop thread is executing cycles
    Running,

    /// A stop has been requested but the thread hasn't exited yet
    Stopping
}

/// Errors that can occur in the controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("Could not spawn the control loop thread: {0}")]
    SpawnError(std::io::Error)
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Controller {
    /// Create a new, stopped, controller.
    pub fn new(params: SharedParams) -> Self {
        let pids = PidPair::new(&params.get());

        Self {
            shared: Arc::new(Shared {
                model: Model::new(params.clone()),
                params,
                pids: Mutex::new(pids),
                stop: AtomicBool::new(false),
                ticks: AtomicU64::new(0),
                timing_violations: AtomicU64::new(0)
            }),
            worker: Mutex::new(None)
        }
    }

    /// The parameters handle, changes made through it are picked up on the
    /// next control cycle.
    pub fn params(&self) -> &SharedParams {
        &self.shared.params
    }

    /// Start the control loop.
    ///
    /// If the loop is already running it is stopped and joined first, so
    /// calling this repeatedly leaves exactly one loop running. The PID
    /// history is cleared before every start, the model is kept.
    pub fn start(&self) -> Result<(), ControllerError> {
        let mut worker = self.worker.lock();

        if let Some(handle) = worker.take() {
            self.shared.stop.store(true, Ordering::SeqCst);
            join_worker(handle);
        }

        self.shared.pids.lock().reset();
        self.shared.stop.store(false, Ordering::SeqCst);

        let shared = self.shared.clone();
        let handle = thread::Builder::new()
            .name(LOOP_THREAD_NAME.into())
            .spawn(move || control_loop::run(shared))
            .map_err(ControllerError::SpawnError)?;

        *worker = Some(handle);

        debug!("Controller started");

        Ok(())
    }

    /// Request the control loop to stop.
    ///
    /// The cycle in progress is always completed. If `block` is true this
    /// waits for the loop thread to exit. Stopping a controller which isn't
    /// running does nothing.
    pub fn stop(&self, block: bool) {
        self.shared.stop.store(true, Ordering::SeqCst);

        if block {
            if let Some(handle) = self.worker.lock().take() {
                join_worker(handle);
                debug!("Controller stopped");
            }
        }
    }

    /// Zero the PID controllers and the model.
    ///
    /// May be called while the loop is running, the next cycle continues from
    /// the zeroed state.
    pub fn reset(&self) {
        let mut pids = self.shared.pids.lock();
        pids.reset();
        self.shared.model.reset();
    }

    /// True if the control loop thread is alive.
    pub fn is_running(&self) -> bool {
        match self.worker.lock().as_ref() {
            Some(handle) => !handle.is_finished(),
            None => false
        }
    }

    pub fn state(&self) -> LoopState {
        if !self.is_running() {
            LoopState::Idle
        }
        else if self.shared.stop.load(Ordering::SeqCst) {
            LoopState::Stopping
        }
        else {
            LoopState::Running
        }
    }

    pub fn stats(&self) -> LoopStats {
        LoopStats {
            ticks: self.shared.ticks.load(Ordering::Relaxed),
            timing_violations: self.shared.timing_violations.load(Ordering::Relaxed)
        }
    }

    /// Set the measured state of the vehicle.
    pub fn set_state(&self, speed_ms: f64, heading_rad: f64) {
        self.shared.model.set_state(speed_ms, heading_rad)
    }

    pub fn get_state(&self) -> Setpoint {
        self.shared.model.get_state()
    }

    /// Set the speed and heading the controller drives towards.
    pub fn set_goal(&self, speed_ms: f64, heading_rad: f64) {
        self.shared.model.set_goal(speed_ms, heading_rad)
    }

    pub fn get_goal(&self) -> Setpoint {
        self.shared.model.get_goal()
    }

    /// The most recent limited command.
    pub fn get_command(&self) -> Command {
        self.shared.model.get_command()
    }

    /// The linear speed of each wheel for the current state and command.
    pub fn get_wheel_lin_vel(&self) -> WheelSpeeds {
        self.shared.model.get_wheel_lin_vel()
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.stop(true);
    }
}

impl PidPair {
    pub(crate) fn new(params: &Params) -> Self {
        let mut pair = Self {
            speed: Pid::unbounded(params.speed_pid),
            heading: Pid::unbounded(params.heading_pid)
        };
        pair.refresh(params);
        pair
    }

    pub(crate) fn reset(&mut self) {
        self.speed.reset();
        self.heading.reset();
    }

    /// Load the gains and output limits from the parameters.
    pub(crate) fn refresh(&mut self, params: &Params) {
        let throttle_span = params.throttle_max - params.throttle_min;
        let steering_span_rad = 2.0 * params.max_steering_angle_rad;

        self.speed.set_gains(params.speed_pid);
        self.speed.set_output_limits(-throttle_span, throttle_span);

        self.heading.set_gains(params.heading_pid);
        self.heading.set_output_limits(-steering_span_rad, steering_span_rad);
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn join_worker(handle: JoinHandle<()>) {
    if handle.join().is_err() {
        error!("Control loop thread panicked");
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{limits::bound_heading, params::PidGains};
    use std::{
        f64::consts::PI,
        time::{Duration, Instant}
    };

    fn controller() -> Controller {
        let mut p = Params::new(1.0, 0.5, 1.0, 1.0).unwrap();
        p.track_width_m = 0.8;
        Controller::new(SharedParams::new(p).unwrap())
    }

    #[test]
    fn test_lifecycle() {
        let ctrl = controller();
        assert!(!ctrl.is_running());
        assert_eq!(ctrl.state(), LoopState::Idle);

        ctrl.start().unwrap();
        ctrl.start().unwrap();
        ctrl.start().unwrap();
        assert!(ctrl.is_running());
        assert_eq!(ctrl.state(), LoopState::Running);

        ctrl.stop(true);
        assert!(!ctrl.is_running());
        assert_eq!(ctrl.state(), LoopState::Idle);

        // Repeated stops are no-ops
        ctrl.stop(true);
        ctrl.stop(false);
        assert!(!ctrl.is_running());

        // Non-blocking stop eventually ends the thread
        ctrl.start().unwrap();
        ctrl.stop(false);
        let t0 = Instant::now();
        while ctrl.is_running() && t0.elapsed() < Duration::from_secs(2) {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(!ctrl.is_running());
    }

    #[test]
    fn test_stats_count_ticks() {
        let ctrl = controller();
        ctrl.start().unwrap();
        thread::sleep(Duration::from_millis(100));
        ctrl.stop(true);

        let stats = ctrl.stats();
        assert!(stats.ticks > 0);
        assert!(stats.timing_violations <= stats.ticks);

        // No cycles once stopped
        thread::sleep(Duration::from_millis(30));
        assert_eq!(ctrl.stats().ticks, stats.ticks);
    }

    #[test]
    fn test_timing_violations_keep_loop_running() {
        let ctrl = controller();

        // No cycle is ever exactly on period, so every cycle is a violation
        ctrl.params().update(|p| p.timing_tolerance = 0.0).unwrap();

        ctrl.start().unwrap();
        thread::sleep(Duration::from_millis(100));
        let stats = ctrl.stats();
        assert!(stats.timing_violations > 0);

        thread::sleep(Duration::from_millis(100));
        assert!(ctrl.is_running());
        assert_eq!(ctrl.state(), LoopState::Running);
        assert!(ctrl.stats().ticks > stats.ticks);
        assert!(ctrl.stats().timing_violations > stats.timing_violations);

        ctrl.stop(true);
    }

    #[test]
    fn test_concurrent_access() {
        let ctrl = Arc::new(controller());
        ctrl.start().unwrap();

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let ctrl = ctrl.clone();
                thread::spawn(move || {
                    for i in 0..5000 {
                        // Every goal written has heading == bound_heading(speed)
                        let x = (t * 5000 + i) as f64 * 0.01 - 100.0;
                        ctrl.set_goal(x, x);

                        let goal = ctrl.get_goal();
                        assert_eq!(goal.heading_rad, bound_heading(goal.speed_ms));

                        let state = ctrl.get_state();
                        assert!(state.heading_rad >= -PI && state.heading_rad < PI);

                        let command = ctrl.get_command();
                        assert!(command.steering_rad.abs() <= 0.5 + 1e-12);
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        assert!(ctrl.is_running());
        ctrl.stop(true);
    }

    #[test]
    fn test_reset_while_running() {
        let ctrl = controller();
        ctrl.set_goal(3.0, 1.0);
        ctrl.start().unwrap();
        thread::sleep(Duration::from_millis(50));

        ctrl.reset();
        assert_eq!(ctrl.get_goal(), Setpoint::default());
        assert!(ctrl.is_running());

        ctrl.stop(true);
        {
            let pids = ctrl.shared.pids.lock();
            assert!(pids.speed.integral().is_finite());
        }
        ctrl.reset();
        let pids = ctrl.shared.pids.lock();
        assert_eq!(pids.speed.integral(), 0.0);
        assert_eq!(pids.heading.integral(), 0.0);
    }

    #[test]
    fn test_restart_clears_pid_history() {
        let ctrl = controller();
        {
            let mut pids = ctrl.shared.pids.lock();
            pids.speed.get_command(0.5, 0.01);
            assert!(pids.speed.integral() != 0.0);
        }

        // Goal equals state so the loop adds no error
        ctrl.start().unwrap();
        ctrl.stop(true);

        let pids = ctrl.shared.pids.lock();
        assert_eq!(pids.speed.integral(), 0.0);
        assert_eq!(pids.speed.prev_error(), 0.0);
    }

    #[test]
    fn test_pid_limits_follow_params() {
        let ctrl = controller();
        ctrl.params().update(|p| {
            p.throttle_min = 0.25;
            p.throttle_max = 0.75;
            p.max_steering_angle_rad = 0.3;
        }).unwrap();
        ctrl.params().set_heading_gains(PidGains::new(4.0, 0.5, 0.0)).unwrap();

        let mut pids = ctrl.shared.pids.lock();
        pids.refresh(&ctrl.params().get());
        assert_eq!(pids.speed.output_limits(), (-0.5, 0.5));
        assert_eq!(pids.heading.output_limits(), (-0.6, 0.6));
        assert_eq!(pids.heading.gains(), PidGains::new(4.0, 0.5, 0.0));
    }

    #[test]
    fn test_drop_stops_loop() {
        let ctrl = controller();
        ctrl.start().unwrap();
        drop(ctrl);
    }
}
