//! General time utility functions

use chrono;

/// Number of nanoseconds in a second
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Convert a duration into a number of seconds, or `None` if overflow
pub fn duration_to_seconds(duration: chrono::Duration) -> Option<f64> {
    duration
        .num_nanoseconds()
        .map(|ns| ns as f64 / NANOS_PER_SECOND as f64)
}

/// Convert a frequency in Hertz into the period of one cycle.
///
/// Returns `None` if the frequency is not strictly positive and finite, or
/// if the period is too long to represent.
pub fn period_from_frequency(frequency_hz: f64) -> Option<std::time::Duration> {
    let period_s = 1.0 / frequency_hz;

    if frequency_hz.is_finite() && frequency_hz > 0.0 && period_s < u64::MAX as f64 {
        Some(std::time::Duration::from_secs_f64(period_s))
    }
    else {
        None
    }
}
