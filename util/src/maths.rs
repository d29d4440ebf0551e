//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::{Float, FloatConst};

/// Clamp a value between `min` and `max`.
///
/// Unlike `f64::clamp` this does not panic if `min > max`, the `min` bound
/// takes precedence in that case.
pub fn clamp<T>(value: &T, min: &T, max: &T) -> T 
where
    T: Float
{
    let mut ret = *value;

    if ret > *max {
        ret = *max
    }
    if ret < *min {
        ret = *min
    }

    ret
}

/// Wrap an angle into the half-open range [-pi, pi).
///
/// Angles already inside the range are returned unchanged, so this function
/// is idempotent. Non-finite values are returned as is.
pub fn wrap_pi<T>(value: T) -> T
where
    T: Float + FloatConst
{
    let pi_t = T::PI();
    let tau_t = T::PI() + T::PI();

    if !value.is_finite() || (value >= -pi_t && value < pi_t) {
        return value;
    }

    let mut wrapped = rem_euclid(value + pi_t, tau_t) - pi_t;

    // Round-off in the remainder can land exactly on an edge
    while wrapped >= pi_t {
        wrapped = wrapped - tau_t;
    }
    while wrapped < -pi_t {
        wrapped = wrapped + tau_t;
    }

    wrapped
}

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
/// 
/// This function is taken from the std library as num is missing it.
///
/// In particular, the return value `r` satisfies `0.0 <= r < rhs.abs()` in
/// most cases. However, due to a floating point round-off error it can
/// result in `r == rhs.abs()`, violating the mathematical definition, if
/// `self` is much smaller than `rhs.abs()` in magnitude and `self < 0.0`.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float
{
    let r = lhs % rhs;
    if r < T::zero() { r + rhs.abs() } else { r }
}
