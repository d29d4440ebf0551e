//! Individual clamp stages of the command limiter.
//!
//! Every stage is a pure function of the parameters and its inputs, returning
//! the (possibly modified) command and whether the stage changed it.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use super::Limits;
use crate::model::Command;
use util::maths::clamp;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Throttle command part way through the throttle pipeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThrottleStage {
    pub throttle: f64,

    /// Speed the throttle corresponds to
    pub velocity_ms: f64
}

/// Steering command part way through the steering pipeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SteeringStage {
    pub steering_rad: f64,

    /// Rate of change of steering implied by `steering_rad`
    pub steering_rate_rads: f64
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<'a> Limits<'a> {

    // ---- THROTTLE ----

    /// Clamp the throttle to `[throttle_min, throttle_max]`.
    pub fn clamp_throttle(&self, throttle: f64) -> (ThrottleStage, bool) {
        let p = self.params();
        let clamped = clamp(&throttle, &p.throttle_min, &p.throttle_max);

        (
            ThrottleStage {
                throttle: clamped,
                velocity_ms: self.throttle_to_speed(clamped)
            },
            clamped != throttle
        )
    }

    /// Clamp the speed the throttle maps to into the velocity bounds,
    /// re-deriving the throttle if the speed moved.
    pub fn clamp_velocity(&self, stage: ThrottleStage) -> (ThrottleStage, bool) {
        let p = self.params();
        let velocity_ms = clamp(
            &stage.velocity_ms, &p.velocity_min_ms, &p.velocity_max_ms
        );

        if velocity_ms == stage.velocity_ms {
            return (stage, false)
        }

        (
            ThrottleStage {
                throttle: self.speed_to_throttle(velocity_ms),
                velocity_ms
            },
            true
        )
    }

    /// Clamp the acceleration needed to reach the stage's speed from
    /// `current_speed_ms` within `dt`.
    pub fn clamp_acceleration(
        &self,
        stage: ThrottleStage,
        current_speed_ms: f64,
        dt: f64
    ) -> (ThrottleStage, bool) {
        let p = self.params();
        let accel_mss = (stage.velocity_ms - current_speed_ms) / dt;
        let clamped = clamp(
            &accel_mss, &p.acceleration_min_mss, &p.acceleration_max_mss
        );

        if accel_mss.is_nan() || clamped == accel_mss {
            return (stage, false)
        }

        let velocity_ms = current_speed_ms + clamped * dt;

        (
            ThrottleStage {
                throttle: self.speed_to_throttle(velocity_ms),
                velocity_ms
            },
            true
        )
    }

    // ---- STEERING ----

    /// Clamp the steering angle to `[-max_steering_angle_rad,
    /// max_steering_angle_rad]`.
    pub fn clamp_steering_angle(&self, steering_rad: f64) -> (f64, bool) {
        let max = self.params().max_steering_angle_rad;
        let clamped = clamp(&steering_rad, &-max, &max);

        (clamped, clamped != steering_rad)
    }

    /// Clamp the steering rate needed to reach `steering_rad` from the
    /// current steering within `dt`.
    pub fn clamp_steering_rate(
        &self,
        steering_rad: f64,
        current: &Command,
        dt: f64
    ) -> (SteeringStage, bool) {
        let p = self.params();
        let rate_rads = (steering_rad - current.steering_rad) / dt;
        let clamped = clamp(
            &rate_rads,
            &p.angular_velocity_min_rads,
            &p.angular_velocity_max_rads
        );

        if rate_rads.is_nan() || clamped == rate_rads {
            return (
                SteeringStage { steering_rad, steering_rate_rads: rate_rads },
                false
            )
        }

        (
            SteeringStage {
                steering_rad: current.steering_rad + clamped * dt,
                steering_rate_rads: clamped
            },
            true
        )
    }

    /// Clamp the steering acceleration needed to reach the stage's rate from
    /// the current rate within `dt`.
    pub fn clamp_steering_accel(
        &self,
        stage: SteeringStage,
        current: &Command,
        dt: f64
    ) -> (SteeringStage, bool) {
        let p = self.params();
        let accel_radss = (stage.steering_rate_rads - current.steering_rate_rads) / dt;
        let clamped = clamp(
            &accel_radss,
            &p.angular_acceleration_min_radss,
            &p.angular_acceleration_max_radss
        );

        if accel_radss.is_nan() || clamped == accel_radss {
            return (stage, false)
        }

        // Constant acceleration over the step
        (
            SteeringStage {
                steering_rad: current.steering_rad
                    + current.steering_rate_rads * dt
                    + 0.5 * clamped * dt * dt,
                steering_rate_rads: current.steering_rate_rads + clamped * dt
            },
            true
        )
    }
}
