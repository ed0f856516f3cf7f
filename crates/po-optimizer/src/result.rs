//! Summary of a finished (or in-progress) optimization run.

use po_space::Space;
use po_types::{argmin, best_index, internal_error, Observation, Point, PoResult};
use serde::{Deserialize, Serialize};

/// Best point found plus the full evaluation trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizeResult {
    /// Best point observed.
    pub x: Point,
    /// Objective value at `x`.
    pub fun: f64,
    /// Every evaluated point, in evaluation order.
    pub x_iters: Vec<Point>,
    pub func_vals: Vec<f64>,
    pub space: Space,
    /// How many of the evaluations were told during warm-up.
    pub n_warmup: usize,
}

impl OptimizeResult {
    pub fn from_history(space: &Space, history: &[Observation]) -> PoResult<Self> {
        let best = best_index(history)
            .ok_or_else(|| internal_error!("no observations to summarize"))?;
        Ok(Self {
            x: history[best].point.clone(),
            fun: history[best].value,
            x_iters: history.iter().map(|o| o.point.clone()).collect(),
            func_vals: history.iter().map(|o| o.value).collect(),
            space: space.clone(),
            n_warmup: history.iter().filter(|o| o.during_warmup).count(),
        })
    }

    /// Position of `x` in the evaluation trace.
    pub fn best_index(&self) -> usize {
        argmin(self.func_vals.iter().copied()).unwrap_or(0)
    }

    /// Best value seen after each evaluation (a convergence trace).
    pub fn running_min(&self) -> Vec<f64> {
        self.func_vals
            .iter()
            .scan(f64::INFINITY, |best, v| {
                *best = best.min(*v);
                Some(*best)
            })
            .collect()
    }

    pub fn n_calls(&self) -> usize {
        self.func_vals.len()
    }
}
