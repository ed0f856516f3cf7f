//! The regression capability the optimizer consumes.

use po_types::{SurrogateError, SurrogateResult};
use serde::{Deserialize, Serialize};

/// Predictive mean and standard deviation, one entry per query point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub mean: Vec<f64>,
    /// Non-negative; zero is allowed at already-observed points.
    pub std: Vec<f64>,
}

impl Prediction {
    pub fn len(&self) -> usize {
        self.mean.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mean.is_empty()
    }
}

/// A probabilistic regression model over encoded points.
///
/// Any model that can be fitted on `[n, d]` inputs and report a mean and an
/// uncertainty per query point plugs in here: Gaussian processes, forests
/// with quantile spreads, test doubles.
pub trait Surrogate: Send {
    /// Replace the current fit with one trained on all of `x`/`y`.
    ///
    /// Always a full refit. Must fail with
    /// [`SurrogateError::Underdetermined`] when fewer than
    /// [`Surrogate::min_distinct_points`] distinct rows are supplied.
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> SurrogateResult<()>;

    /// Predict at each row of `x`.
    fn predict(&self, x: &[Vec<f64>]) -> SurrogateResult<Prediction>;

    /// Minimum number of distinct training rows `fit` accepts.
    fn min_distinct_points(&self) -> usize {
        2
    }

    /// Human-readable model name.
    fn name(&self) -> &str;
}

/// Number of pairwise-distinct rows (exact comparison).
pub fn count_distinct(x: &[Vec<f64>]) -> usize {
    let mut distinct: Vec<&Vec<f64>> = Vec::with_capacity(x.len());
    for row in x {
        if !distinct.iter().any(|seen| *seen == row) {
            distinct.push(row);
        }
    }
    distinct.len()
}

/// Shared input checks for [`Surrogate::fit`] implementations.
///
/// Returns the input dimensionality.
pub fn validate_training_data(
    x: &[Vec<f64>],
    y: &[f64],
    min_distinct: usize,
) -> SurrogateResult<usize> {
    let n_dims = x.first().map_or(0, Vec::len);
    let fail = |reason: String| SurrogateError::FitFailed {
        n_points: x.len(),
        n_dims,
        reason,
    };

    if x.len() != y.len() {
        return Err(fail(format!(
            "{} input rows but {} target values",
            x.len(),
            y.len()
        )));
    }
    if let Some(row) = x.iter().find(|row| row.len() != n_dims) {
        return Err(fail(format!(
            "ragged input: row of length {} among rows of length {n_dims}",
            row.len()
        )));
    }
    if x.iter().flatten().any(|v| !v.is_finite()) {
        return Err(fail("non-finite input value".to_string()));
    }
    if y.iter().any(|v| !v.is_finite()) {
        return Err(fail("non-finite target value".to_string()));
    }

    // No model can be fitted to an empty set, whatever the caller asks for.
    let required = min_distinct.max(1);
    let distinct = count_distinct(x);
    if distinct < required {
        return Err(SurrogateError::Underdetermined { distinct, required });
    }
    Ok(n_dims)
}
