//! # Simulated vehicle
//!
//! A stand-in for the real vehicle, used to close the control loop in the
//! executable and in the system tests. The speed follows the throttle
//! directly and the heading follows the bicycle model, with optional uniform
//! noise added to both after every step.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::warn;
use rand::{distributions::Uniform, rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// Internal
use crate::{
    limits::bound_heading,
    model::Setpoint,
    params::Params
};
use util::maths::clamp;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Options of the simulated vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlantOptions {
    pub wheel_base_m: f64,

    /// Steering commands beyond this are capped
    pub max_steering_angle_rad: f64,

    /// Speed reached at full throttle
    pub velocity_max_ms: f64,

    /// Multiplier applied to the steering angle. 1.0 for a healthy vehicle,
    /// 0.0 for one whose steering doesn't respond.
    pub steering_gain: f64,

    /// Half width of the uniform noise added to the speed and heading. Zero
    /// disables the noise.
    pub noise_amplitude: f64,

    /// Seed of the noise generator
    pub seed: u64
}

/// The simulated vehicle.
pub struct Plant {
    opts: PlantOptions,

    speed_ms: f64,
    heading_rad: f64,

    /// Noise distribution, `None` when the noise is disabled
    noise: Option<Uniform<f64>>,

    rng: StdRng
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors in the simulated vehicle's options.
#[derive(Debug, Error)]
pub enum PlantError {
    #[error("Noise amplitude must be finite and non-negative, got {0}")]
    InvalidNoiseAmplitude(f64),

    #[error("Wheel base must be finite and positive, got {0}")]
    InvalidWheelBase(f64)
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PlantOptions {
    /// Noise free options matching the vehicle described by `params`.
    pub fn from_params(params: &Params) -> Self {
        Self {
            wheel_base_m: params.wheel_base_m,
            max_steering_angle_rad: params.max_steering_angle_rad,
            velocity_max_ms: params.velocity_max_ms,
            steering_gain: 1.0,
            noise_amplitude: 0.0,
            seed: 0
        }
    }

    /// Check the options can be simulated.
    pub fn validate(&self) -> Result<(), PlantError> {
        // The full noise interval must be representable
        if !(self.noise_amplitude >= 0.0 && (2.0 * self.noise_amplitude).is_finite()) {
            return Err(PlantError::InvalidNoiseAmplitude(self.noise_amplitude))
        }
        if !(self.wheel_base_m > 0.0 && self.wheel_base_m.is_finite()) {
            return Err(PlantError::InvalidWheelBase(self.wheel_base_m))
        }

        Ok(())
    }
}

impl Plant {
    /// Create a new plant at rest, heading zero.
    pub fn new(opts: PlantOptions) -> Result<Self, PlantError> {
        opts.validate()?;

        let noise = if opts.noise_amplitude > 0.0 {
            Some(Uniform::new(-opts.noise_amplitude, opts.noise_amplitude))
        }
        else {
            None
        };

        Ok(Self {
            opts,
            speed_ms: 0.0,
            heading_rad: 0.0,
            noise,
            rng: StdRng::seed_from_u64(opts.seed)
        })
    }

    /// Put the plant back at rest, heading zero.
    pub fn reset(&mut self) {
        self.speed_ms = 0.0;
        self.heading_rad = 0.0;
    }

    pub fn set_state(&mut self, speed_ms: f64, heading_rad: f64) {
        self.speed_ms = speed_ms;
        self.heading_rad = bound_heading(heading_rad);
    }

    pub fn get_state(&self) -> Setpoint {
        Setpoint {
            speed_ms: self.speed_ms,
            heading_rad: self.heading_rad
        }
    }

    /// Drive the plant with the given command for `dt` seconds.
    pub fn command(&mut self, throttle: f64, steering_rad: f64, dt: f64) {
        let max_rad = self.opts.max_steering_angle_rad;

        if steering_rad.abs() > max_rad {
            warn!(
                "Plant given a steering angle beyond its limit ({} vs. {}), capping",
                steering_rad, max_rad
            );
        }
        let steering_rad = clamp(&steering_rad, &-max_rad, &max_rad) * self.opts.steering_gain;

        // Throttle maps straight onto speed, no reverse
        self.speed_ms = clamp(&throttle, &0.0, &1.0) * self.opts.velocity_max_ms;

        self.heading_rad += dt * (self.speed_ms / self.opts.wheel_base_m) * steering_rad.tan();

        // Noise
        if let Some(noise) = &self.noise {
            self.speed_ms += self.rng.sample(noise);
            self.heading_rad += self.rng.sample(noise);
        }

        self.heading_rad = bound_heading(self.heading_rad);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn opts() -> PlantOptions {
        PlantOptions::from_params(&Params::new(1.0, 0.5, 1.0, 1.0).unwrap())
    }

    #[test]
    fn test_noise_free_step() {
        let mut plant = Plant::new(opts()).unwrap();

        plant.command(0.2, 0.25, 0.1);

        let s = plant.get_state();
        assert!((s.speed_ms - 2.0).abs() < 1e-12);
        assert!((s.heading_rad - 0.1 * 2.0 * 0.25f64.tan()).abs() < 1e-12);

        plant.reset();
        assert_eq!(plant.get_state(), Setpoint::default());
    }

    #[test]
    fn test_steering_capped() {
        let mut plant = Plant::new(opts()).unwrap();
        plant.command(0.1, 3.0, 1.0);

        let s = plant.get_state();
        assert!((s.heading_rad - 0.5f64.tan()).abs() < 1e-12);
    }

    #[test]
    fn test_broken_steering() {
        let mut o = opts();
        o.steering_gain = 0.0;
        let mut plant = Plant::new(o).unwrap();

        for _ in 0..100 {
            plant.command(0.5, 0.4, 0.01);
        }
        assert_eq!(plant.get_state().heading_rad, 0.0);
    }

    #[test]
    fn test_noise_bounded_and_seeded() {
        let mut o = opts();
        o.noise_amplitude = 0.01;
        o.seed = 42;

        let mut a = Plant::new(o).unwrap();
        let mut b = Plant::new(o).unwrap();

        for _ in 0..50 {
            a.command(0.3, 0.0, 0.01);
            b.command(0.3, 0.0, 0.01);

            let s = a.get_state();
            assert!((s.speed_ms - 3.0).abs() < 0.01 + 1e-12);
            assert_eq!(s, b.get_state());
        }
    }

    #[test]
    fn test_invalid_options_rejected() {
        for amp in [1e308, f64::INFINITY, f64::NAN, -0.1] {
            let mut o = opts();
            o.noise_amplitude = amp;
            assert!(matches!(
                Plant::new(o),
                Err(PlantError::InvalidNoiseAmplitude(_))
            ));
        }

        let mut o = opts();
        o.wheel_base_m = 0.0;
        assert!(matches!(Plant::new(o), Err(PlantError::InvalidWheelBase(_))));

        // Largest amplitudes that can still be sampled
        let mut o = opts();
        o.noise_amplitude = 1e307;
        let mut plant = Plant::new(o).unwrap();
        plant.command(0.1, 0.0, 0.01);
        assert!(plant.get_state().speed_ms.abs() <= 1e307 + 1.0);
    }
}
