//! Gaussian-process regression surrogate.
//!
//! Targets are standardized (zero mean, unit variance) before fitting and the
//! kernel works in the encoded `[0, 1]^d` space, so one isotropic lengthscale
//! is meaningful across dimensions. The lengthscale is picked from a fixed
//! candidate grid by maximizing the log marginal likelihood; candidates whose
//! kernel matrix fails to factorize are skipped.

use nalgebra::{Cholesky, DMatrix, DVector, Dyn};
use po_types::{config_error, PoResult, SurrogateError, SurrogateResult};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::surrogate::{validate_training_data, Prediction, Surrogate};

const SQRT_5: f64 = 2.236_067_977_499_79;
const LN_2PI: f64 = 1.837_877_066_409_345_5;

/// Stationary covariance functions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Kernel {
    /// `(1 + √5 r + 5/3 r²) exp(-√5 r)`
    #[default]
    Matern52,
    /// Squared exponential, `exp(-r² / 2)`.
    Rbf,
}

impl Kernel {
    /// Correlation at scaled squared distance `r_sq`.
    fn correlation(&self, r_sq: f64) -> f64 {
        match self {
            Kernel::Matern52 => {
                let r = r_sq.sqrt();
                let sqrt5_r = SQRT_5 * r;
                (1.0 + sqrt5_r + 5.0 / 3.0 * r_sq) * (-sqrt5_r).exp()
            }
            Kernel::Rbf => (-0.5 * r_sq).exp(),
        }
    }

    fn eval(&self, a: &[f64], b: &[f64], lengthscale: f64, signal_var: f64) -> f64 {
        let r_sq = a
            .iter()
            .zip(b)
            .map(|(x, y)| {
                let d = (x - y) / lengthscale;
                d * d
            })
            .sum::<f64>();
        signal_var * self.correlation(r_sq)
    }
}

/// Gaussian-process hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpConfig {
    pub kernel: Kernel,
    /// Observation noise variance (standardized target units) added to the
    /// kernel diagonal.
    pub noise_variance: f64,
    /// Lengthscale candidates; the one with the highest marginal likelihood
    /// is used. A single entry fixes the lengthscale.
    pub lengthscales: Vec<f64>,
    /// Minimum number of distinct points accepted by `fit`.
    pub min_distinct_points: usize,
}

impl Default for GpConfig {
    fn default() -> Self {
        Self {
            kernel: Kernel::Matern52,
            noise_variance: 1e-6,
            lengthscales: vec![
                0.03, 0.05, 0.08, 0.12, 0.18, 0.25, 0.35, 0.5, 0.7, 1.0, 1.5, 2.5,
            ],
            min_distinct_points: 2,
        }
    }
}

impl GpConfig {
    pub fn with_kernel(mut self, kernel: Kernel) -> Self {
        self.kernel = kernel;
        self
    }

    pub fn with_noise_variance(mut self, noise_variance: f64) -> Self {
        self.noise_variance = noise_variance;
        self
    }

    pub fn with_lengthscale(mut self, lengthscale: f64) -> Self {
        self.lengthscales = vec![lengthscale];
        self
    }

    pub fn with_min_distinct_points(mut self, min_distinct_points: usize) -> Self {
        self.min_distinct_points = min_distinct_points;
        self
    }

    pub fn validate(&self) -> PoResult<()> {
        if !self.noise_variance.is_finite() || self.noise_variance < 0.0 {
            return Err(config_error!(
                "noise_variance must be finite and non-negative, got {}",
                self.noise_variance
            ));
        }
        if self.lengthscales.is_empty() {
            return Err(config_error!("at least one candidate lengthscale is required"));
        }
        if let Some(l) = self.lengthscales.iter().find(|l| !l.is_finite() || **l <= 0.0) {
            return Err(config_error!("lengthscales must be finite and positive, got {l}"));
        }
        if self.min_distinct_points == 0 {
            return Err(config_error!("min_distinct_points must be at least 1"));
        }
        Ok(())
    }
}

/// A fitted model ready for predictions.
#[derive(Debug, Clone)]
struct FittedGp {
    x_train: Vec<Vec<f64>>,
    /// Lower Cholesky factor L of `K + σ²I`.
    l: DMatrix<f64>,
    /// `(K + σ²I)^{-1} y` for standardized y.
    alpha: DVector<f64>,
    lengthscale: f64,
    y_mean: f64,
    y_std: f64,
    log_marginal_likelihood: f64,
}

/// Gaussian-process surrogate.
#[derive(Debug, Clone, Default)]
pub struct GaussianProcess {
    config: GpConfig,
    fitted: Option<FittedGp>,
}

impl GaussianProcess {
    pub fn new(config: GpConfig) -> Self {
        Self {
            config,
            fitted: None,
        }
    }

    pub fn config(&self) -> &GpConfig {
        &self.config
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    /// Lengthscale picked by the last fit.
    pub fn lengthscale(&self) -> Option<f64> {
        self.fitted.as_ref().map(|f| f.lengthscale)
    }

    pub fn log_marginal_likelihood(&self) -> Option<f64> {
        self.fitted.as_ref().map(|f| f.log_marginal_likelihood)
    }

    fn kernel_matrix(&self, x: &[Vec<f64>], lengthscale: f64) -> DMatrix<f64> {
        let n = x.len();
        DMatrix::from_fn(n, n, |i, j| {
            let k = self.config.kernel.eval(&x[i], &x[j], lengthscale, 1.0);
            if i == j {
                k + self.config.noise_variance
            } else {
                k
            }
        })
    }
}

impl Surrogate for GaussianProcess {
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> SurrogateResult<()> {
        let n_dims = validate_training_data(x, y, self.config.min_distinct_points)?;
        if let Err(err) = self.config.validate() {
            self.fitted = None;
            return Err(SurrogateError::FitFailed {
                n_points: x.len(),
                n_dims,
                reason: err.to_string(),
            });
        }
        let n = y.len();

        let y_mean = y.iter().sum::<f64>() / n as f64;
        let y_var = y.iter().map(|v| (v - y_mean).powi(2)).sum::<f64>() / (n - 1).max(1) as f64;
        let y_std = if y_var.sqrt() > 1e-12 { y_var.sqrt() } else { 1.0 };
        let y_standardized = DVector::from_iterator(n, y.iter().map(|v| (v - y_mean) / y_std));

        let mut best: Option<(f64, f64, Cholesky<f64, Dyn>, DVector<f64>)> = None;
        for &lengthscale in &self.config.lengthscales {
            let Some(cholesky) = Cholesky::new(self.kernel_matrix(x, lengthscale)) else {
                continue;
            };
            let alpha = cholesky.solve(&y_standardized);
            let log_det_half: f64 = cholesky.l_dirty().diagonal().iter().map(|d| d.ln()).sum();
            let lml = -0.5 * y_standardized.dot(&alpha) - log_det_half - 0.5 * n as f64 * LN_2PI;
            if !lml.is_finite() {
                continue;
            }
            if best.as_ref().map_or(true, |(best_lml, ..)| lml > *best_lml) {
                best = Some((lml, lengthscale, cholesky, alpha));
            }
        }

        let Some((lml, lengthscale, cholesky, alpha)) = best else {
            self.fitted = None;
            return Err(SurrogateError::FitFailed {
                n_points: n,
                n_dims,
                reason: "kernel matrix is not positive definite for any lengthscale".to_string(),
            });
        };

        debug!(n_points = n, n_dims, lengthscale, lml, "fitted gaussian process");

        self.fitted = Some(FittedGp {
            x_train: x.to_vec(),
            l: cholesky.l(),
            alpha,
            lengthscale,
            y_mean,
            y_std,
            log_marginal_likelihood: lml,
        });
        Ok(())
    }

    fn predict(&self, x: &[Vec<f64>]) -> SurrogateResult<Prediction> {
        let fitted = self.fitted.as_ref().ok_or(SurrogateError::NotFitted)?;
        let n_dims = fitted.x_train.first().map_or(0, Vec::len);
        if let Some(row) = x.iter().find(|row| row.len() != n_dims) {
            return Err(SurrogateError::DimensionMismatch {
                expected: n_dims,
                actual: row.len(),
            });
        }
        if x.is_empty() {
            return Ok(Prediction {
                mean: Vec::new(),
                std: Vec::new(),
            });
        }

        // Column j holds k(X_train, x_j).
        let k_star = DMatrix::from_fn(fitted.x_train.len(), x.len(), |i, j| {
            self.config
                .kernel
                .eval(&fitted.x_train[i], &x[j], fitted.lengthscale, 1.0)
        });
        let mean_std = k_star.tr_mul(&fitted.alpha);
        let v = fitted
            .l
            .solve_lower_triangular(&k_star)
            .ok_or_else(|| SurrogateError::FitFailed {
                n_points: fitted.x_train.len(),
                n_dims,
                reason: "singular Cholesky factor during prediction".to_string(),
            })?;

        let mut mean = Vec::with_capacity(x.len());
        let mut std = Vec::with_capacity(x.len());
        for j in 0..x.len() {
            let explained = v.column(j).norm_squared();
            let var = (1.0 - explained).max(0.0);
            mean.push(mean_std[j] * fitted.y_std + fitted.y_mean);
            std.push(var.sqrt() * fitted.y_std);
        }
        Ok(Prediction { mean, std })
    }

    fn min_distinct_points(&self) -> usize {
        self.config.min_distinct_points
    }

    fn name(&self) -> &str {
        "gaussian_process"
    }
}
