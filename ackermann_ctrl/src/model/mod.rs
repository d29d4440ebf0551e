//! # Vehicle model
//!
//! Bicycle model of an Ackermann steered vehicle. Holds the goal, the
//! estimated state and the last issued command, and integrates commands into
//! a new state.
//!
//! Each of the three groups sits behind its own lock, readers always get a
//! consistent snapshot of a group but two groups read one after the other may
//! come from different control cycles.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod wheels;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use parking_lot::Mutex;
use serde::Serialize;
use std::f64::consts::FRAC_PI_2;

// Internal
use crate::{
    limits::{bound_heading, shortest_arc_to_turn, Limits},
    params::SharedParams
};
use util::maths::clamp;

pub use wheels::{wheel_speeds, WheelSpeeds};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Distance the stored steering angle is kept away from +/- pi/2, where the
/// turning radius goes to zero.
pub const STEERING_SINGULARITY_MARGIN_RAD: f64 = 1.0e-3;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A speed and heading pair, used for both the goal and the state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Setpoint {
    pub speed_ms: f64,

    /// Heading, always in [-pi, pi)
    pub heading_rad: f64
}

/// A drive command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Command {
    pub throttle: f64,
    pub steering_rad: f64,
    pub steering_rate_rads: f64
}

/// Difference between the goal and the state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TrackingError {
    /// Goal speed minus current speed
    pub speed_ms: f64,

    /// Shortest signed turn from the current to the goal heading
    pub heading_rad: f64
}

/// The vehicle model.
pub struct Model {
    params: SharedParams,

    goal: Mutex<Setpoint>,
    state: Mutex<Setpoint>,
    command: Mutex<Command>
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Model {
    /// Create a new model at rest with a zero goal.
    pub fn new(params: SharedParams) -> Self {
        Self {
            params,
            goal: Mutex::new(Setpoint::default()),
            state: Mutex::new(Setpoint::default()),
            command: Mutex::new(Command::default())
        }
    }

    /// Zero the goal, the state and the command.
    pub fn reset(&self) {
        *self.goal.lock() = Setpoint::default();
        *self.state.lock() = Setpoint::default();
        *self.command.lock() = Command::default();
    }

    /// Set the estimated state of the vehicle.
    pub fn set_state(&self, speed_ms: f64, heading_rad: f64) {
        *self.state.lock() = Setpoint {
            speed_ms,
            heading_rad: bound_heading(heading_rad)
        };
    }

    pub fn get_state(&self) -> Setpoint {
        *self.state.lock()
    }

    /// Set the speed and heading to drive towards.
    pub fn set_goal(&self, speed_ms: f64, heading_rad: f64) {
        *self.goal.lock() = Setpoint {
            speed_ms,
            heading_rad: bound_heading(heading_rad)
        };
    }

    pub fn get_goal(&self) -> Setpoint {
        *self.goal.lock()
    }

    /// The last command passed to [`Model::command`].
    pub fn get_command(&self) -> Command {
        *self.command.lock()
    }

    /// Get the error between the goal and the current state.
    pub fn get_error(&self) -> TrackingError {
        let goal = self.get_goal();
        let state = self.get_state();

        TrackingError {
            speed_ms: goal.speed_ms - state.speed_ms,
            heading_rad: shortest_arc_to_turn(state.heading_rad, goal.heading_rad)
        }
    }

    /// Apply a command for `dt` seconds and integrate the state forward.
    ///
    /// The speed follows the throttle instantly, the heading is integrated
    /// with a forward Euler step of the bicycle model.
    pub fn command(&self, throttle: f64, steering_rad: f64, dt: f64) {
        debug_assert!(dt > 0.0, "Model time step must be positive, got {}", dt);

        let params = self.params.get();
        let limits = Limits::new(&params);

        let max_steering_rad = FRAC_PI_2 - STEERING_SINGULARITY_MARGIN_RAD;
        let steering_rad = clamp(&steering_rad, &-max_steering_rad, &max_steering_rad);

        {
            let mut command = self.command.lock();
            let steering_rate_rads = (steering_rad - command.steering_rad) / dt;

            *command = Command {
                throttle,
                steering_rad,
                steering_rate_rads
            };
        }

        let speed_ms = limits.throttle_to_speed(throttle);

        let mut state = self.state.lock();
        let heading_rate_rads = (speed_ms / params.wheel_base_m) * steering_rad.tan();

        *state = Setpoint {
            speed_ms,
            heading_rad: bound_heading(state.heading_rad + heading_rate_rads * dt)
        };
    }

    /// Get the linear speed of each wheel for the current state and steering.
    pub fn get_wheel_lin_vel(&self) -> WheelSpeeds {
        let params = self.params.get();
        let speed_ms = self.get_state().speed_ms;
        let steering_rad = self.get_command().steering_rad;

        wheel_speeds(
            params.wheel_base_m,
            params.track_width_m,
            speed_ms,
            steering_rad
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::params::Params;
    use std::f64::consts::{FRAC_PI_4, PI};

    fn model() -> Model {
        let mut p = Params::new(1.0, 1.0, 1.0, 1.0).unwrap();
        p.track_width_m = 2.0;
        Model::new(SharedParams::new(p).unwrap())
    }

    #[test]
    fn test_get_set() {
        let m = model();

        m.set_state(1.5, 0.3);
        m.set_goal(2.5, -0.7);

        assert_eq!(m.get_state(), Setpoint { speed_ms: 1.5, heading_rad: 0.3 });
        assert_eq!(m.get_goal(), Setpoint { speed_ms: 2.5, heading_rad: -0.7 });

        // Headings are wrapped on the way in
        m.set_goal(0.0, 3.0 * PI);
        assert!((m.get_goal().heading_rad + PI).abs() < 1e-12);

        m.reset();
        assert_eq!(m.get_state(), Setpoint::default());
        assert_eq!(m.get_goal(), Setpoint::default());
        assert_eq!(m.get_command(), Command::default());
    }

    #[test]
    fn test_error_across_wrap() {
        let m = model();

        m.set_state(0.0, -(FRAC_PI_2 + 0.1));
        m.set_goal(1.0, FRAC_PI_2);
        let e = m.get_error();
        assert_eq!(e.speed_ms, 1.0);
        assert!((e.heading_rad + (PI - 0.1)).abs() < 1e-12, "got {}", e.heading_rad);

        m.set_state(1.0, FRAC_PI_2);
        m.set_goal(0.0, -(FRAC_PI_2 + 0.1));
        let e = m.get_error();
        assert_eq!(e.speed_ms, -1.0);
        assert!((e.heading_rad - (PI - 0.1)).abs() < 1e-12, "got {}", e.heading_rad);
    }

    #[test]
    fn test_zero_command_huge_dt() {
        let m = model();
        m.set_state(100.0, 0.4);

        m.command(0.0, 0.0, f64::MAX);

        let state = m.get_state();
        assert_eq!(state.speed_ms, 0.0);
        assert_eq!(state.heading_rad, 0.4);
    }

    #[test]
    fn test_command_integrates_heading() {
        let m = model();

        // 0.2 throttle -> 2 m/s, tan(pi/4) = 1 -> 2 rad/s
        m.command(0.2, FRAC_PI_4, 0.1);

        let state = m.get_state();
        assert!((state.speed_ms - 2.0).abs() < 1e-12);
        assert!((state.heading_rad - 0.2).abs() < 1e-12);

        let command = m.get_command();
        assert_eq!(command.throttle, 0.2);
        assert_eq!(command.steering_rad, FRAC_PI_4);
        assert!((command.steering_rate_rads - FRAC_PI_4 / 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_steering_singularity() {
        let m = model();
        m.command(0.5, FRAC_PI_2, 0.01);

        let command = m.get_command();
        assert!(command.steering_rad < FRAC_PI_2);
        assert!(m.get_state().heading_rad.is_finite());
    }

    #[test]
    fn test_wheel_speeds() {
        let m = model();

        m.command(0.3, 0.0, 0.01);
        let w = m.get_wheel_lin_vel();
        let speed = m.get_state().speed_ms;
        assert_eq!(w, WheelSpeeds {
            left_front: speed,
            right_front: speed,
            left_rear: speed,
            right_rear: speed
        });

        let p = m.params.get();
        m.command(Limits::new(&p).speed_to_throttle(2.0), FRAC_PI_4, 0.01);
        let w = m.get_wheel_lin_vel();
        assert!((w.right_front - 2.0).abs() < 1e-10);
        assert!((w.left_front - 2.0 * 5f64.sqrt()).abs() < 1e-10);
        assert!((w.left_rear - 4.0).abs() < 1e-10);
        assert!(w.right_rear.abs() < 1e-10);

        m.command(Limits::new(&p).speed_to_throttle(2.0), -FRAC_PI_4, 0.01);
        let w = m.get_wheel_lin_vel();
        assert!((w.left_front - 2.0).abs() < 1e-10);
        assert!((w.right_front - 2.0 * 5f64.sqrt()).abs() < 1e-10);
        assert!((w.right_rear - 4.0).abs() < 1e-10);
        assert!(w.left_rear.abs() < 1e-10);
    }
}
