//! # Kinematic limits module
//!
//! Converts raw commands into ones the vehicle can physically realise. The
//! throttle and steering commands each pass through a cascade of clamp
//! stages (see [`stages`]), applied in a fixed order by [`Limits::limit`].
//!
//! The heading helpers [`bound_heading`] and [`shortest_arc_to_turn`] don't
//! depend on any parameter and are free functions.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod stages;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Serialize;

// Internal
use crate::{model::Command, params::Params};
use util::maths::{clamp, wrap_pi};

pub use stages::{SteeringStage, ThrottleStage};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Applies the kinematic limits held in a set of parameters.
#[derive(Debug, Clone, Copy)]
pub struct Limits<'a> {
    params: &'a Params
}

/// Report on which limit stages modified a command.
#[derive(Clone, Copy, Default, Serialize, Debug, PartialEq, Eq)]
pub struct LimitReport {
    pub throttle_limited: bool,
    pub velocity_limited: bool,
    pub acceleration_limited: bool,
    pub steering_angle_limited: bool,
    pub steering_rate_limited: bool,
    pub steering_accel_limited: bool
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<'a> Limits<'a> {
    /// Create the limits for the given parameters.
    pub fn new(params: &'a Params) -> Self {
        Self { params }
    }

    /// The parameters the limits are read from.
    pub fn params(&self) -> &'a Params {
        self.params
    }

    /// Convert a throttle setting into a vehicle speed.
    ///
    /// The throttle is clamped to its bounds and scaled linearly onto
    /// `[0, velocity_max_ms]`. A throttle at or below zero gives zero speed,
    /// reverse motion is not modelled.
    pub fn throttle_to_speed(&self, throttle: f64) -> f64 {
        let throttle = clamp(
            &throttle,
            &self.params.throttle_min,
            &self.params.throttle_max
        );

        if throttle <= 0.0 {
            0.0
        }
        else {
            throttle * self.params.velocity_max_ms
        }
    }

    /// Convert a vehicle speed into a throttle setting.
    ///
    /// The speed is first clamped to the velocity bounds.
    pub fn speed_to_throttle(&self, speed_ms: f64) -> f64 {
        let speed_ms = clamp(
            &speed_ms,
            &self.params.velocity_min_ms,
            &self.params.velocity_max_ms
        );

        if speed_ms <= 0.0 {
            0.0
        }
        else {
            speed_ms / self.params.velocity_max_ms
        }
    }

    /// Limit a desired command to what the vehicle can achieve in `dt`
    /// seconds from its current speed and steering.
    ///
    /// The throttle goes through the throttle, velocity and acceleration
    /// stages, the steering through the angle, rate and acceleration stages.
    /// Each stage sees the output of the previous one and may re-derive it,
    /// but never reopens an earlier bound.
    ///
    /// The `throttle` and `steering_rad` of `current` are the last issued
    /// command, its `steering_rate_rads` the last steering rate. The returned
    /// command's `steering_rate_rads` is the rate implied by the limited
    /// steering.
    pub fn limit(
        &self,
        current_speed_ms: f64,
        current: &Command,
        desired: Command,
        dt: f64
    ) -> (Command, LimitReport) {
        debug_assert!(dt > 0.0, "Limit time step must be positive, got {}", dt);

        let mut report = LimitReport::default();

        // ---- THROTTLE ----

        let (throttle, limited) = self.clamp_throttle(desired.throttle);
        report.throttle_limited = limited;

        let (throttle, limited) = self.clamp_velocity(throttle);
        report.velocity_limited = limited;

        let (throttle, limited) = self.clamp_acceleration(
            throttle, current_speed_ms, dt
        );
        report.acceleration_limited = limited;

        // ---- STEERING ----

        let (steering_rad, limited) = self.clamp_steering_angle(
            desired.steering_rad
        );
        report.steering_angle_limited = limited;

        let (steering, limited) = self.clamp_steering_rate(
            steering_rad, current, dt
        );
        report.steering_rate_limited = limited;

        let (steering, limited) = self.clamp_steering_accel(
            steering, current, dt
        );
        report.steering_accel_limited = limited;

        (
            Command {
                throttle: throttle.throttle,
                steering_rad: steering.steering_rad,
                steering_rate_rads: steering.steering_rate_rads
            },
            report
        )
    }
}

impl LimitReport {
    /// True if any stage modified the command.
    pub fn any(&self) -> bool {
        self.throttle_limited
            || self.velocity_limited
            || self.acceleration_limited
            || self.steering_angle_limited
            || self.steering_rate_limited
            || self.steering_accel_limited
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Wrap a heading into the range [-pi, pi).
///
/// Headings already in range are returned unchanged, so
/// `bound_heading(bound_heading(x)) == bound_heading(x)`.
pub fn bound_heading(heading_rad: f64) -> f64 {
    wrap_pi(heading_rad)
}

/// Get the signed minimal rotation taking `current_rad` onto `desired_rad`.
///
/// The result is in the range (-pi, pi], positive for a rotation in the
/// positive heading direction.
pub fn shortest_arc_to_turn(current_rad: f64, desired_rad: f64) -> f64 {
    // Wrapping the negated difference into [-pi, pi) gives (-pi, pi] once
    // negated back
    -wrap_pi(current_rad - desired_rad)
}
