//! # PID controller
//!
//! A discrete PID compensator driving one scalar error to zero. The output is
//! clamped to `[out_min, out_max]` and the integral is back-calculated while
//! the output is pinned so that it does not wind up.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Serialize;

// Internal
use crate::params::PidGains;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A PID controller
#[derive(Debug, Serialize, Clone)]
pub struct Pid {
    /// Controller gains
    gains: PidGains,

    /// Lower output limit
    out_min: f64,

    /// Upper output limit
    out_max: f64,

    /// Previous error
    prev_error: f64,

    /// The integral accumulation
    integral: f64
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Pid {

    /// Create a new controller with the given gains and output limits.
    pub fn new(gains: PidGains, out_min: f64, out_max: f64) -> Self {
        Self {
            gains,
            out_min,
            out_max,
            prev_error: 0f64,
            integral: 0f64
        }
    }

    /// Create a new controller whose output is not limited.
    pub fn unbounded(gains: PidGains) -> Self {
        Self::new(gains, f64::MIN, f64::MAX)
    }

    /// The current gains.
    pub fn gains(&self) -> PidGains {
        self.gains
    }

    /// Replace the gains. The integral and previous error are kept.
    pub fn set_gains(&mut self, gains: PidGains) {
        self.gains = gains;
    }

    /// The output limits as `(min, max)`.
    pub fn output_limits(&self) -> (f64, f64) {
        (self.out_min, self.out_max)
    }

    /// Replace the output limits.
    pub fn set_output_limits(&mut self, out_min: f64, out_max: f64) {
        self.out_min = out_min;
        self.out_max = out_max;
    }

    /// The accumulated integral of the error.
    pub fn integral(&self) -> f64 {
        self.integral
    }

    /// The error passed in on the previous call.
    pub fn prev_error(&self) -> f64 {
        self.prev_error
    }

    /// Get the output of the controller for the given error.
    ///
    /// `current_error` is the desired value minus the actual value, `dt` the
    /// time since the previous call in seconds, which must be strictly
    /// positive.
    pub fn get_command(&mut self, current_error: f64, dt: f64) -> f64 {
        debug_assert!(dt > 0.0, "PID time step must be positive, got {}", dt);

        let PidGains { k_p, k_i, k_d } = self.gains;

        // Accumulate the integral term. Without an integral gain nothing
        // accumulates, so enabling it later starts from a clean integral.
        if k_i != 0.0 {
            self.integral += current_error * dt;
        }

        // Calculate the derivative
        let deriv = (current_error - self.prev_error) / dt;

        // Calculate the raw output
        let raw = k_p * current_error + k_i * self.integral + k_d * deriv;

        // Clamp the output, removing the excess from the integral so that it
        // sits exactly on the boundary
        let out = if raw > self.out_max {
            self.unwind(raw - self.out_max);
            self.out_max
        }
        else if raw < self.out_min {
            self.unwind(raw - self.out_min);
            self.out_min
        }
        else {
            raw
        };

        // Remember the unclamped error
        self.prev_error = current_error;

        out
    }

    /// Reset the controller's history.
    pub fn reset(&mut self) {
        self.prev_error = 0f64;
        self.integral = 0f64;
    }

    /// Remove the given output excess from the integral.
    fn unwind(&mut self, excess: f64) {
        // With no integral gain the integral doesn't contribute to the output
        if self.gains.k_i != 0.0 {
            self.integral -= excess / self.gains.k_i;
        }
    }
}
