//! Numeric policy shared by every statistic the engine reports.
//!
//! Two rules apply everywhere:
//!
//! - Reported floats are rounded to six decimal places ([`round6`]) so that
//!   persisted and displayed values are identical across platforms.
//! - A ratio whose denominator is exactly zero is computed against
//!   [`DIVISION_EPSILON`] instead ([`guard_denominator`]). The result is
//!   large-but-finite (or zero when the numerator is zero), never `inf`/`NaN`.

/// Substitute denominator used when a ratio would divide by zero.
pub const DIVISION_EPSILON: f64 = 1e-9;

/// Round to six decimal places.
pub fn round6(x: f64) -> f64 {
    (x * 1e6).round() / 1e6
}

/// Return `denominator`, or [`DIVISION_EPSILON`] when it is exactly zero.
pub fn guard_denominator(denominator: f64) -> f64 {
    if denominator == 0.0 {
        DIVISION_EPSILON
    } else {
        denominator
    }
}

/// Arithmetic mean; `0.0` for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (divides by `n - 1`); `0.0` when `n <= 1`.
pub fn sample_stddev(values: &[f64]) -> f64 {
    if values.len() <= 1 {
        return 0.0;
    }
    let m = mean(values);
    let sum_sq: f64 = values.iter().map(|x| (x - m) * (x - m)).sum();
    (sum_sq / (values.len() - 1) as f64).sqrt()
}
