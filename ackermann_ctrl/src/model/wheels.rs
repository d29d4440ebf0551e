//! Wheel linear velocities from the Ackermann turning geometry.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Serialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Linear speed of each wheel, in meters/second.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct WheelSpeeds {
    pub left_front: f64,
    pub right_front: f64,
    pub left_rear: f64,
    pub right_rear: f64
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Compute the speed of every wheel for a vehicle moving at `speed_ms` with
/// the given steering angle.
///
/// All wheels rotate about a common centre on the rear axle line, a
/// distance `wheel_base_m / tan(steering_rad)` from the vehicle centreline.
/// Positive steering puts the centre on the right of the vehicle.
pub fn wheel_speeds(
    wheel_base_m: f64,
    track_width_m: f64,
    speed_ms: f64,
    steering_rad: f64
) -> WheelSpeeds {
    // No turn centre when driving straight
    if steering_rad == 0.0 {
        return WheelSpeeds {
            left_front: speed_ms,
            right_front: speed_ms,
            left_rear: speed_ms,
            right_rear: speed_ms
        }
    }

    let half_track_m = 0.5 * track_width_m;

    let radius_m = wheel_base_m / steering_rad.tan();
    let rate_rads = speed_ms / radius_m;

    let left_rear_m = radius_m + half_track_m;
    let right_rear_m = radius_m - half_track_m;
    let left_front_m = (wheel_base_m.powi(2) + left_rear_m.powi(2)).sqrt();
    let right_front_m = (wheel_base_m.powi(2) + right_rear_m.powi(2)).sqrt();

    WheelSpeeds {
        left_front: (rate_rads * left_front_m).abs(),
        right_front: (rate_rads * right_front_m).abs(),
        left_rear: (rate_rads * left_rear_m).abs(),
        right_rear: (rate_rads * right_rear_m).abs()
    }
}
