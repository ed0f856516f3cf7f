//! Observations: told (point, objective value) pairs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::values::Point;

/// One evaluated point and its objective value.
///
/// Observations are append-only; the ordered sequence of them is the
/// optimizer's history and the sole input to surrogate refits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Position in the history (0-indexed evaluation order).
    pub index: usize,
    pub point: Point,
    pub value: f64,
    /// Whether the optimizer was still in its warm-up phase when this
    /// observation arrived.
    pub during_warmup: bool,
    pub recorded_at: DateTime<Utc>,
}

impl Observation {
    pub fn new(index: usize, point: Point, value: f64, during_warmup: bool) -> Self {
        Self {
            index,
            point,
            value,
            during_warmup,
            recorded_at: Utc::now(),
        }
    }
}

/// Index of the lowest value; the earliest one wins ties.
pub fn argmin<I>(values: I) -> Option<usize>
where
    I: IntoIterator<Item = f64>,
{
    let mut best: Option<(usize, f64)> = None;
    for (i, value) in values.into_iter().enumerate() {
        match best {
            Some((_, best_value)) if value >= best_value => {}
            _ => best = Some((i, value)),
        }
    }
    best.map(|(i, _)| i)
}

/// Index of the lowest-valued observation; the earliest one wins ties.
pub fn best_index(history: &[Observation]) -> Option<usize> {
    argmin(history.iter().map(|obs| obs.value))
}
