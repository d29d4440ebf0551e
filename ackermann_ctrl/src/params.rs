//! Parameters structure for the Ackermann controller

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Gains of one PID controller.
#[derive(Debug, Default, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct PidGains {
    /// Proportional gain
    pub k_p: f64,

    /// Integral gain
    #[serde(default)]
    pub k_i: f64,

    /// Derivative gain
    #[serde(default)]
    pub k_d: f64
}

/// Parameters for the Ackermann controller.
///
/// All bounds are inclusive. Bounds which are not given in a parameter file
/// take their default value, for the steering rate and acceleration bounds
/// that is the full range of `f64` so the corresponding limit stage is a
/// pass-through.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Params {

    // ---- CONTROL LOOP ----

    /// Frequency at which the control loop runs.
    ///
    /// Units: Hertz
    #[serde(default = "default_control_frequency_hz")]
    pub control_frequency_hz: f64,

    /// Allowed deviation of a measured loop period from the nominal period
    /// before a timing violation is reported, as a fraction of the period.
    #[serde(default = "default_timing_tolerance")]
    pub timing_tolerance: f64,

    // ---- GEOMETRY ----

    /// Distance between the front and rear axles.
    ///
    /// Units: meters
    pub wheel_base_m: f64,

    /// Distance between the left and right wheels of an axle.
    ///
    /// Units: meters
    #[serde(default)]
    pub track_width_m: f64,

    // ---- CAPABILITIES ----

    /// Maximum absolute angle of the (virtual, bicycle model) steered wheel.
    ///
    /// Units: radians
    pub max_steering_angle_rad: f64,

    /// Minimum throttle setting
    #[serde(default = "default_throttle_min")]
    pub throttle_min: f64,

    /// Maximum throttle setting, maps onto `velocity_max_ms`
    #[serde(default = "default_throttle_max")]
    pub throttle_max: f64,

    /// Minimum vehicle speed. Reverse driving is not modelled.
    ///
    /// Units: meters/second
    #[serde(default = "default_velocity_min_ms")]
    pub velocity_min_ms: f64,

    /// Maximum vehicle speed.
    ///
    /// Units: meters/second
    #[serde(default = "default_velocity_max_ms")]
    pub velocity_max_ms: f64,

    /// Minimum vehicle acceleration (i.e. maximum braking).
    ///
    /// Units: meters/second^2
    #[serde(default = "default_acceleration_min_mss")]
    pub acceleration_min_mss: f64,

    /// Maximum vehicle acceleration.
    ///
    /// Units: meters/second^2
    #[serde(default = "default_acceleration_max_mss")]
    pub acceleration_max_mss: f64,

    /// Minimum (leftward) rate of change of the steering angle.
    ///
    /// Units: radians/second
    #[serde(default = "unbounded_min")]
    pub angular_velocity_min_rads: f64,

    /// Maximum (rightward) rate of change of the steering angle.
    ///
    /// Units: radians/second
    #[serde(default = "unbounded_max")]
    pub angular_velocity_max_rads: f64,

    /// Minimum (leftward) steering angle acceleration.
    ///
    /// Units: radians/second^2
    #[serde(default = "unbounded_min")]
    pub angular_acceleration_min_radss: f64,

    /// Maximum (rightward) steering angle acceleration.
    ///
    /// Units: radians/second^2
    #[serde(default = "unbounded_max")]
    pub angular_acceleration_max_radss: f64,

    // ---- CONTROLLERS ----

    /// Speed controller gains
    pub speed_pid: PidGains,

    /// Heading controller gains
    pub heading_pid: PidGains
}

/// A thread safe handle to a set of parameters.
///
/// Clones of the handle share the same parameters, so a change made through
/// one handle is seen by the control thread on its next cycle. Every change
/// is validated before it is committed.
#[derive(Debug, Clone)]
pub struct SharedParams {
    inner: Arc<RwLock<Params>>
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors associated with invalid parameters.
#[derive(Debug, Error)]
pub enum ParamsError {
    #[error("Parameter `{name}` must be finite, found {value}")]
    NotFinite { name: &'static str, value: f64 },

    #[error("Parameter `{name}` must be strictly positive, found {value}")]
    NotPositive { name: &'static str, value: f64 },

    #[error("Parameter `{name}` must not be negative, found {value}")]
    Negative { name: &'static str, value: f64 },

    #[error("Bounds `{name}` are inverted (min = {min}, max = {max})")]
    InvertedBounds { name: &'static str, min: f64, max: f64 },

    #[error("The maximum steering angle must be below pi/2 rad, found {0}")]
    SteeringAngleTooLarge(f64),

    #[error("Cannot load the parameters: {0}")]
    LoadError(#[from] util::params::LoadError)
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PidGains {
    /// Create a new set of gains.
    pub fn new(k_p: f64, k_i: f64, k_d: f64) -> Self {
        Self { k_p, k_i, k_d }
    }

    fn validate(&self, name: &'static str) -> Result<(), ParamsError> {
        for v in [self.k_p, self.k_i, self.k_d].iter() {
            check_finite(name, *v)?;
        }
        Ok(())
    }
}

impl Params {
    /// Create a new set of parameters from the required values, all other
    /// values taking their defaults.
    ///
    /// Only the proportional gain of each controller is set, integral and
    /// derivative gains are zero.
    pub fn new(
        wheel_base_m: f64,
        max_steering_angle_rad: f64,
        speed_k_p: f64,
        heading_k_p: f64
    ) -> Result<Self, ParamsError> {
        let params = Self {
            control_frequency_hz: default_control_frequency_hz(),
            timing_tolerance: default_timing_tolerance(),
            wheel_base_m,
            track_width_m: 0.0,
            max_steering_angle_rad,
            throttle_min: default_throttle_min(),
            throttle_max: default_throttle_max(),
            velocity_min_ms: default_velocity_min_ms(),
            velocity_max_ms: default_velocity_max_ms(),
            acceleration_min_mss: default_acceleration_min_mss(),
            acceleration_max_mss: default_acceleration_max_mss(),
            angular_velocity_min_rads: unbounded_min(),
            angular_velocity_max_rads: unbounded_max(),
            angular_acceleration_min_radss: unbounded_min(),
            angular_acceleration_max_radss: unbounded_max(),
            speed_pid: PidGains::new(speed_k_p, 0.0, 0.0),
            heading_pid: PidGains::new(heading_k_p, 0.0, 0.0)
        };

        params.validate()?;

        Ok(params)
    }

    /// Load the parameters from a file relative to the params directory and
    /// validate them.
    pub fn load(param_file_path: &str) -> Result<Self, ParamsError> {
        let params: Self = util::params::load(param_file_path)?;
        params.validate()?;
        Ok(params)
    }

    /// Load the parameters from an arbitrary file and validate them.
    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ParamsError> {
        let params: Self = util::params::load_from_path(path)?;
        params.validate()?;
        Ok(params)
    }

    /// Parse the parameters from a TOML string and validate them.
    pub fn from_toml_str(params_str: &str) -> Result<Self, ParamsError> {
        let params: Self = util::params::from_str(params_str)?;
        params.validate()?;
        Ok(params)
    }

    /// Period of one control cycle in seconds.
    pub fn control_period_s(&self) -> f64 {
        1.0 / self.control_frequency_hz
    }

    /// Check that the parameters are consistent.
    pub fn validate(&self) -> Result<(), ParamsError> {
        check_positive("control_frequency_hz", self.control_frequency_hz)?;
        check_not_negative("timing_tolerance", self.timing_tolerance)?;
        check_positive("wheel_base_m", self.wheel_base_m)?;
        check_not_negative("track_width_m", self.track_width_m)?;
        check_positive("max_steering_angle_rad", self.max_steering_angle_rad)?;
        check_positive("velocity_max_ms", self.velocity_max_ms)?;

        if self.max_steering_angle_rad >= std::f64::consts::FRAC_PI_2 {
            return Err(ParamsError::SteeringAngleTooLarge(
                self.max_steering_angle_rad
            ));
        }

        check_bounds("throttle", self.throttle_min, self.throttle_max)?;
        check_bounds("velocity", self.velocity_min_ms, self.velocity_max_ms)?;
        check_bounds(
            "acceleration",
            self.acceleration_min_mss,
            self.acceleration_max_mss
        )?;
        check_bounds(
            "angular_velocity",
            self.angular_velocity_min_rads,
            self.angular_velocity_max_rads
        )?;
        check_bounds(
            "angular_acceleration",
            self.angular_acceleration_min_radss,
            self.angular_acceleration_max_radss
        )?;

        self.speed_pid.validate("speed_pid")?;
        self.heading_pid.validate("heading_pid")?;

        Ok(())
    }
}

impl SharedParams {
    /// Validate the parameters and wrap them in a new handle.
    pub fn new(params: Params) -> Result<Self, ParamsError> {
        params.validate()?;

        Ok(Self {
            inner: Arc::new(RwLock::new(params))
        })
    }

    /// Get a snapshot of the current parameters.
    pub fn get(&self) -> Params {
        *self.inner.read()
    }

    /// Modify the parameters.
    ///
    /// The closure is applied to a copy of the current parameters, which
    /// replaces them only if it is valid. On error the parameters are left
    /// unchanged.
    pub fn update<F>(&self, f: F) -> Result<(), ParamsError>
    where
        F: FnOnce(&mut Params)
    {
        let mut guard = self.inner.write();
        let mut params = *guard;

        f(&mut params);
        params.validate()?;

        *guard = params;

        Ok(())
    }

    /// Set the speed controller gains.
    pub fn set_speed_gains(&self, gains: PidGains) -> Result<(), ParamsError> {
        self.update(|p| p.speed_pid = gains)
    }

    /// Set the heading controller gains.
    pub fn set_heading_gains(&self, gains: PidGains) -> Result<(), ParamsError> {
        self.update(|p| p.heading_pid = gains)
    }

    /// Set the frequency of the control loop.
    pub fn set_control_frequency(&self, frequency_hz: f64) -> Result<(), ParamsError> {
        self.update(|p| p.control_frequency_hz = frequency_hz)
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn default_control_frequency_hz() -> f64 { 100.0 }
fn default_timing_tolerance() -> f64 { 0.1 }
fn default_throttle_min() -> f64 { 0.0 }
fn default_throttle_max() -> f64 { 1.0 }
fn default_velocity_min_ms() -> f64 { 0.0 }
fn default_velocity_max_ms() -> f64 { 10.0 }
fn default_acceleration_min_mss() -> f64 { -5.0 }
fn default_acceleration_max_mss() -> f64 { 5.0 }
fn unbounded_min() -> f64 { f64::MIN }
fn unbounded_max() -> f64 { f64::MAX }

fn check_finite(name: &'static str, value: f64) -> Result<(), ParamsError> {
    if value.is_finite() {
        Ok(())
    }
    else {
        Err(ParamsError::NotFinite { name, value })
    }
}

fn check_positive(name: &'static str, value: f64) -> Result<(), ParamsError> {
    check_finite(name, value)?;
    if value > 0.0 {
        Ok(())
    }
    else {
        Err(ParamsError::NotPositive { name, value })
    }
}

fn check_not_negative(name: &'static str, value: f64) -> Result<(), ParamsError> {
    check_finite(name, value)?;
    if value >= 0.0 {
        Ok(())
    }
    else {
        Err(ParamsError::Negative { name, value })
    }
}

fn check_bounds(name: &'static str, min: f64, max: f64) -> Result<(), ParamsError> {
    check_finite(name, min)?;
    check_finite(name, max)?;
    if min <= max {
        Ok(())
    }
    else {
        Err(ParamsError::InvertedBounds { name, min, max })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults() {
        let p = Params::new(1.0, 0.5, 1.0, 2.0).unwrap();

        assert_eq!(p.control_frequency_hz, 100.0);
        assert_eq!(p.velocity_max_ms, 10.0);
        assert_eq!(p.angular_velocity_max_rads, f64::MAX);
        assert_eq!(p.angular_acceleration_min_radss, f64::MIN);
        assert_eq!(p.speed_pid, PidGains::new(1.0, 0.0, 0.0));
        assert_eq!(p.heading_pid, PidGains::new(2.0, 0.0, 0.0));
        assert!((p.control_period_s() - 0.01).abs() < 1e-15);
    }

    #[test]
    fn test_invalid_construction() {
        assert!(matches!(
            Params::new(0.0, 0.5, 1.0, 1.0),
            Err(ParamsError::NotPositive { name: "wheel_base_m", .. })
        ));
        assert!(matches!(
            Params::new(1.0, -0.5, 1.0, 1.0),
            Err(ParamsError::NotPositive { name: "max_steering_angle_rad", .. })
        ));
        assert!(matches!(
            Params::new(1.0, 45.0, 1.0, 1.0),
            Err(ParamsError::SteeringAngleTooLarge(_))
        ));
        assert!(matches!(
            Params::new(1.0, 0.5, f64::NAN, 1.0),
            Err(ParamsError::NotFinite { name: "speed_pid", .. })
        ));
    }

    #[test]
    fn test_inverted_bounds() {
        let mut p = Params::new(1.0, 0.5, 1.0, 1.0).unwrap();
        p.acceleration_min_mss = 2.0;
        p.acceleration_max_mss = 1.0;

        assert!(matches!(
            p.validate(),
            Err(ParamsError::InvertedBounds { name: "acceleration", .. })
        ));
    }

    #[test]
    fn test_from_toml() {
        let p = Params::from_toml_str(
            r#"
            wheel_base_m = 0.45
            track_width_m = 0.3
            max_steering_angle_rad = 0.785
            angular_velocity_max_rads = 2.0
            angular_velocity_min_rads = -2.0

            [speed_pid]
            k_p = 1.0
            k_i = 0.1

            [heading_pid]
            k_p = 1.5
            k_d = 0.05
            "#
        ).unwrap();

        assert_eq!(p.wheel_base_m, 0.45);
        assert_eq!(p.track_width_m, 0.3);
        assert_eq!(p.angular_velocity_max_rads, 2.0);
        assert_eq!(p.angular_acceleration_max_radss, f64::MAX);
        assert_eq!(p.acceleration_min_mss, -5.0);
        assert_eq!(p.speed_pid, PidGains::new(1.0, 0.1, 0.0));
        assert_eq!(p.heading_pid, PidGains::new(1.5, 0.0, 0.05));

        assert!(matches!(
            Params::from_toml_str("wheel_base_m = 1.0"),
            Err(ParamsError::LoadError(_))
        ));
    }

    #[test]
    fn test_shared_update() {
        let shared = SharedParams::new(Params::new(1.0, 0.5, 1.0, 1.0).unwrap())
            .unwrap();
        let other = shared.clone();

        other.set_speed_gains(PidGains::new(3.0, 0.2, 0.1)).unwrap();
        assert_eq!(shared.get().speed_pid, PidGains::new(3.0, 0.2, 0.1));

        other.set_control_frequency(50.0).unwrap();
        assert_eq!(shared.get().control_frequency_hz, 50.0);

        // An invalid update leaves the parameters untouched
        assert!(shared.set_control_frequency(0.0).is_err());
        assert!(shared.update(|p| p.velocity_min_ms = 20.0).is_err());
        assert_eq!(shared.get().control_frequency_hz, 50.0);
        assert_eq!(shared.get().velocity_min_ms, 0.0);
    }

    #[test]
    fn test_load_shipped_file() {
        let p = Params::load_from_path(
            concat!(env!("CARGO_MANIFEST_DIR"), "/../params/ackermann.toml")
        ).unwrap();

        assert_eq!(p.control_frequency_hz, 100.0);
        assert_eq!(p.max_steering_angle_rad, 0.5);
        assert_eq!(p.angular_acceleration_max_radss, f64::MAX);
        assert_eq!(p.heading_pid.k_p, 1.0);

        assert!(matches!(
            Params::load_from_path("/nonexistent/ackermann.toml"),
            Err(ParamsError::LoadError(_))
        ));
    }
}
