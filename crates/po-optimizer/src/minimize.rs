//! Closed-loop drivers for objectives that can be called in-process.

use po_learning::{GaussianProcess, GpConfig};
use po_space::Space;
use po_types::{config_error, validation_error, ParamValue, Point, PoResult};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::OptimizerConfig;
use crate::optimizer::Optimizer;
use crate::result::OptimizeResult;

/// Settings for [`gp_minimize`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinimizeConfig {
    /// Objective evaluations to spend, including any evaluation of `x0`.
    pub n_calls: usize,
    pub optimizer: OptimizerConfig,
    pub gp: GpConfig,
    /// Initial points. Evaluated first unless `y0` is given.
    pub x0: Vec<Point>,
    /// Known values at `x0`; told as prior data without calling the objective.
    pub y0: Vec<f64>,
}

impl Default for MinimizeConfig {
    fn default() -> Self {
        Self {
            n_calls: 100,
            optimizer: OptimizerConfig::default(),
            gp: GpConfig::default(),
            x0: Vec::new(),
            y0: Vec::new(),
        }
    }
}

impl MinimizeConfig {
    pub fn with_n_calls(mut self, n: usize) -> Self {
        self.n_calls = n;
        self
    }

    pub fn with_optimizer(mut self, optimizer: OptimizerConfig) -> Self {
        self.optimizer = optimizer;
        self
    }

    pub fn with_gp(mut self, gp: GpConfig) -> Self {
        self.gp = gp;
        self
    }

    pub fn with_initial_points(mut self, x0: Vec<Point>) -> Self {
        self.x0 = x0;
        self
    }

    pub fn with_initial_values(mut self, x0: Vec<Point>, y0: Vec<f64>) -> Self {
        self.x0 = x0;
        self.y0 = y0;
        self
    }
}

/// Minimize `objective` with a Gaussian-process surrogate.
pub fn gp_minimize<F>(
    mut objective: F,
    space: Space,
    config: MinimizeConfig,
) -> PoResult<OptimizeResult>
where
    F: FnMut(&[ParamValue]) -> f64,
{
    let MinimizeConfig {
        n_calls,
        optimizer,
        gp,
        x0,
        y0,
    } = config;
    if n_calls == 0 && x0.is_empty() {
        return Err(config_error!(
            "n_calls must be positive when no initial points are given"
        ));
    }
    if !y0.is_empty() && y0.len() != x0.len() {
        return Err(validation_error!(
            "{} initial points but {} initial values",
            x0.len(),
            y0.len()
        ));
    }

    gp.validate()?;
    let surrogate = Box::new(GaussianProcess::new(gp));
    let mut opt = Optimizer::with_surrogate(space, optimizer, surrogate)?;
    let mut calls = 0;
    if y0.is_empty() {
        for point in x0 {
            let value = objective(&point);
            opt.tell(point, value)?;
            calls += 1;
        }
    } else {
        opt.tell_many(x0, y0)?;
    }

    while calls < n_calls {
        let point = opt.ask_one()?;
        let value = objective(&point);
        opt.tell(point, value)?;
        calls += 1;
    }

    let result = opt.result()?;
    info!(n_calls = calls, best = result.fun, "gp_minimize finished");
    Ok(result)
}

/// Random search: every evaluation is a prior sample from `space`.
pub fn dummy_minimize<F>(
    objective: F,
    space: Space,
    n_calls: usize,
    seed: u64,
) -> PoResult<OptimizeResult>
where
    F: FnMut(&[ParamValue]) -> f64,
{
    if n_calls == 0 {
        return Err(config_error!("n_calls must be positive"));
    }
    let config = MinimizeConfig::default()
        .with_n_calls(n_calls)
        .with_optimizer(random_search_config(n_calls, seed));
    gp_minimize(objective, space, config)
}

/// Warm-up never ends inside the loop, so the surrogate is never fitted.
fn random_search_config(n_calls: usize, seed: u64) -> OptimizerConfig {
    OptimizerConfig::new(seed).with_warmup_count(n_calls.saturating_add(1))
}
