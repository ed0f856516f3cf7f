//! Objective + space + known optimum bundles used to validate optimizers.

use po_space::Space;
use po_types::{validation_error, ParamValue, PoResult};
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::benchmarks::{bench1, bench2, bench3, branin, BENCH3_MIN, BRANIN_MIN};

/// Numeric objective over the plain values of a point.
pub type ObjectiveFn = fn(&[f64]) -> f64;

/// Measurement noise added on top of the true objective.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub enum NoiseModel {
    #[default]
    Zero,
    /// Gaussian noise with a fixed standard deviation.
    Constant { size: f64 },
    /// Gaussian noise with standard deviation `size * |value|`.
    Proportional { size: f64 },
}

impl NoiseModel {
    /// Draw one noise term for a true objective value.
    pub fn sample<R: Rng + ?Sized>(&self, value: f64, rng: &mut R) -> f64 {
        let std = match self {
            NoiseModel::Zero => return 0.0,
            NoiseModel::Constant { size } => *size,
            NoiseModel::Proportional { size } => size * value.abs(),
        };
        let z: f64 = rng.sample(StandardNormal);
        z * std
    }
}

/// A synthetic experiment: a space, an objective on it and its true minimum.
#[derive(Clone)]
pub struct ModelSystem {
    pub name: String,
    pub space: Space,
    objective: ObjectiveFn,
    pub true_min: f64,
    pub noise: NoiseModel,
}

impl fmt::Debug for ModelSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSystem")
            .field("name", &self.name)
            .field("space", &self.space)
            .field("true_min", &self.true_min)
            .field("noise", &self.noise)
            .finish_non_exhaustive()
    }
}

impl ModelSystem {
    pub fn new(
        name: impl Into<String>,
        objective: ObjectiveFn,
        space: Space,
        noise: NoiseModel,
        true_min: f64,
    ) -> Self {
        Self {
            name: name.into(),
            space,
            objective,
            true_min,
            noise,
        }
    }

    /// Noise-free objective value at `point`.
    pub fn true_score(&self, point: &[ParamValue]) -> PoResult<f64> {
        self.space.validate(point)?;
        let values = point
            .iter()
            .map(|v| {
                v.as_f64().ok_or_else(|| {
                    validation_error!("model system '{}' only takes numeric points", self.name)
                })
            })
            .collect::<PoResult<Vec<f64>>>()?;
        Ok((self.objective)(&values))
    }

    /// Objective value at `point` with one draw of measurement noise.
    pub fn score<R: Rng + ?Sized>(&self, point: &[ParamValue], rng: &mut R) -> PoResult<f64> {
        let value = self.true_score(point)?;
        Ok(value + self.noise.sample(value, rng))
    }

    /// Distance of an observed value above the true minimum.
    pub fn regret(&self, value: f64) -> f64 {
        value - self.true_min
    }
}

fn one_dimensional(low: f64, high: f64) -> PoResult<Space> {
    Space::builder().real("x", low, high).build()
}

/// `bench1` on [-2, 2], minimum 0.
pub fn bench1_system() -> PoResult<ModelSystem> {
    Ok(ModelSystem::new(
        "bench1",
        bench1,
        one_dimensional(-2.0, 2.0)?,
        NoiseModel::Zero,
        0.0,
    ))
}

/// `bench2` on [-6, 6], minimum -5.
pub fn bench2_system() -> PoResult<ModelSystem> {
    Ok(ModelSystem::new(
        "bench2",
        bench2,
        one_dimensional(-6.0, 6.0)?,
        NoiseModel::Zero,
        -5.0,
    ))
}

/// `bench3` on [-2, 2], minimum ≈ -0.909.
pub fn bench3_system() -> PoResult<ModelSystem> {
    Ok(ModelSystem::new(
        "bench3",
        bench3,
        one_dimensional(-2.0, 2.0)?,
        NoiseModel::Zero,
        BENCH3_MIN,
    ))
}

/// Branin-Hoo with constant measurement noise of 0.02.
pub fn branin_hoo() -> PoResult<ModelSystem> {
    let space = Space::builder()
        .real("x1", -5.0, 10.0)
        .real("x2", 0.0, 15.0)
        .build()?;
    Ok(ModelSystem::new(
        "branin_hoo",
        branin,
        space,
        NoiseModel::Constant { size: 0.02 },
        BRANIN_MIN,
    ))
}
