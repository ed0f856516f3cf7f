//! Synthetic objectives with known minima.

use std::f64::consts::PI;

/// `x²`; minimum 0 at x = 0.
pub fn bench1(x: &[f64]) -> f64 {
    x[0] * x[0]
}

/// Two basins: `x²` for x < 0, `(x - 5)² - 5` otherwise; minimum -5 at x = 5.
pub fn bench2(x: &[f64]) -> f64 {
    if x[0] < 0.0 {
        x[0] * x[0]
    } else {
        (x[0] - 5.0).powi(2) - 5.0
    }
}

/// `sin(5x)(1 - tanh(x²))`; minimum ≈ -0.9094 near x = -0.289.
pub fn bench3(x: &[f64]) -> f64 {
    (5.0 * x[0]).sin() * (1.0 - (x[0] * x[0]).tanh())
}

/// Minimum of [`bench3`] over [-2, 2].
pub const BENCH3_MIN: f64 = -0.909_429_8;

/// Branin-Hoo function on x1 ∈ [-5, 10], x2 ∈ [0, 15].
///
/// Three global minima, (-π, 12.275), (π, 2.275) and (9.42478, 2.475), all
/// with value [`BRANIN_MIN`].
pub fn branin(x: &[f64]) -> f64 {
    let a = 1.0;
    let b = 5.1 / (4.0 * PI * PI);
    let c = 5.0 / PI;
    let r = 6.0;
    let s = 10.0;
    let t = 1.0 / (8.0 * PI);
    let (x1, x2) = (x[0], x[1]);
    a * (x2 - b * x1 * x1 + c * x1 - r).powi(2) + s * (1.0 - t) * x1.cos() + s
}

pub const BRANIN_MIN: f64 = 0.397_887;
