//! # Ackermann controller library.
//!
//! Fixed-rate speed and heading control of a vehicle with Ackermann steering.
//! The [`Controller`](controller::Controller) runs two PID loops on a
//! dedicated thread, saturates their output against the vehicle's kinematic
//! limits and integrates the result through a bicycle model.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Controller parameters - vehicle geometry, actuation bounds and PID gains
pub mod params;

/// PID compensator with output clamping and integral anti-windup
pub mod pid;

/// Kinematic limits - throttle/speed mapping, heading wrapping and the cascaded command limiter
pub mod limits;

/// Bicycle model of the vehicle - tracks state and integrates commands
pub mod model;

/// Top level controller - owns the control thread
pub mod controller;

/// Simulated vehicle used to close the loop in the executable and the system tests
pub mod plant;

// ------------------------------------------------------------------------------------------------
// REEXPORTS
// ------------------------------------------------------------------------------------------------

pub use controller::{Controller, ControllerError, LoopState, LoopStats};
pub use limits::{Limits, LimitReport};
pub use model::{Command, Model, Setpoint, TrackingError, WheelSpeeds};
pub use params::{Params, ParamsError, PidGains, SharedParams};
pub use pid::Pid;
pub use plant::{Plant, PlantError, PlantOptions};
