//! Acquisition functions: how much a candidate is worth evaluating next.
//!
//! All scores are "higher is better" and assume the objective is minimized.

use po_learning::Prediction;
use po_types::{config_error, PoResult};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Scores closer than this (relative to their magnitude) count as tied.
const SCORE_TIE_TOLERANCE: f64 = 1e-12;

/// Which acquisition function ranks candidates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcquisitionKind {
    /// Expected improvement over the best observation, less a margin `xi`.
    #[default]
    ExpectedImprovement,
    /// `mean - kappa * std`, negated so higher is better.
    LowerConfidenceBound,
    /// Probability of improving on the best observation by more than `xi`.
    ProbabilityOfImprovement,
}

impl AcquisitionKind {
    /// `xi` for EI/PI, `kappa` for LCB.
    pub fn default_exploration_weight(&self) -> f64 {
        match self {
            AcquisitionKind::ExpectedImprovement | AcquisitionKind::ProbabilityOfImprovement => {
                0.01
            }
            AcquisitionKind::LowerConfidenceBound => 1.96,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AcquisitionKind::ExpectedImprovement => "EI",
            AcquisitionKind::LowerConfidenceBound => "LCB",
            AcquisitionKind::ProbabilityOfImprovement => "PI",
        }
    }
}

/// Acquisition function plus its exploration coefficient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    pub kind: AcquisitionKind,
    /// Improvement margin `xi` for EI/PI, std multiplier `kappa` for LCB.
    /// Larger values favour unexplored regions.
    pub exploration_weight: f64,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self::new(AcquisitionKind::default())
    }
}

impl AcquisitionConfig {
    pub fn new(kind: AcquisitionKind) -> Self {
        Self {
            kind,
            exploration_weight: kind.default_exploration_weight(),
        }
    }

    pub fn expected_improvement() -> Self {
        Self::new(AcquisitionKind::ExpectedImprovement)
    }

    pub fn lower_confidence_bound() -> Self {
        Self::new(AcquisitionKind::LowerConfidenceBound)
    }

    pub fn probability_of_improvement() -> Self {
        Self::new(AcquisitionKind::ProbabilityOfImprovement)
    }

    pub fn with_exploration_weight(mut self, weight: f64) -> Self {
        self.exploration_weight = weight;
        self
    }

    pub fn validate(&self) -> PoResult<()> {
        if !self.exploration_weight.is_finite() || self.exploration_weight < 0.0 {
            return Err(config_error!(
                "{} exploration weight must be finite and non-negative, got {}",
                self.kind.name(),
                self.exploration_weight
            ));
        }
        Ok(())
    }

    /// Score a single candidate.
    pub fn score(&self, mean: f64, std: f64, best_observed: f64) -> f64 {
        score(self.kind, mean, std, best_observed, self.exploration_weight)
    }

    /// Score every point of a prediction batch; equivalent to calling
    /// [`AcquisitionConfig::score`] per point. Points with a non-finite
    /// prediction (or score) rank last with `-inf`.
    pub fn score_batch(&self, prediction: &Prediction, best_observed: f64) -> Vec<f64> {
        prediction
            .mean
            .iter()
            .zip(&prediction.std)
            .map(|(&mean, &std)| {
                if !mean.is_finite() || !std.is_finite() {
                    return f64::NEG_INFINITY;
                }
                let s = self.score(mean, std, best_observed);
                if s.is_nan() {
                    f64::NEG_INFINITY
                } else {
                    s
                }
            })
            .collect()
    }
}

/// Acquisition score, higher is better.
pub fn score(
    kind: AcquisitionKind,
    mean: f64,
    std: f64,
    best_observed: f64,
    exploration_weight: f64,
) -> f64 {
    match kind {
        AcquisitionKind::ExpectedImprovement => {
            expected_improvement(mean, std, best_observed, exploration_weight)
        }
        AcquisitionKind::LowerConfidenceBound => {
            -lower_confidence_bound(mean, std, exploration_weight)
        }
        AcquisitionKind::ProbabilityOfImprovement => {
            probability_of_improvement(mean, std, best_observed, exploration_weight)
        }
    }
}

/// `EI = (best - mean - xi) Φ(z) + std φ(z)`, `z = (best - mean - xi) / std`.
///
/// With `std == 0` this is the plain improvement `max(best - mean - xi, 0)`,
/// so an already-optimal point scores 0.
pub fn expected_improvement(mean: f64, std: f64, best_observed: f64, xi: f64) -> f64 {
    let improvement = best_observed - mean - xi;
    if std <= 0.0 {
        return improvement.max(0.0);
    }
    let z = improvement / std;
    (improvement * norm_cdf(z) + std * norm_pdf(z)).max(0.0)
}

/// Raw lower confidence bound, `mean - kappa * std` (lower is better).
pub fn lower_confidence_bound(mean: f64, std: f64, kappa: f64) -> f64 {
    mean - kappa * std
}

/// `PI = Φ((best - mean - xi) / std)`.
pub fn probability_of_improvement(mean: f64, std: f64, best_observed: f64, xi: f64) -> f64 {
    let improvement = best_observed - mean - xi;
    if std <= 0.0 {
        return if improvement > 0.0 { 1.0 } else { 0.0 };
    }
    norm_cdf(improvement / std)
}

/// True if the two scores are equal within numerical tolerance.
pub fn scores_tie(a: f64, b: f64) -> bool {
    if a == b {
        return true;
    }
    let scale = 1.0 + a.abs().max(b.abs());
    (a - b).abs() <= SCORE_TIE_TOLERANCE * scale
}

/// Rank candidate `a` against candidate `b`: `Greater` means `a` is
/// preferred. Tied scores fall back to the larger predictive std; `Equal`
/// leaves the decision to candidate order.
pub fn compare_candidates(score_a: f64, std_a: f64, score_b: f64, std_b: f64) -> Ordering {
    if scores_tie(score_a, score_b) {
        std_a.partial_cmp(&std_b).unwrap_or(Ordering::Equal)
    } else {
        score_a.partial_cmp(&score_b).unwrap_or(Ordering::Equal)
    }
}

/// Index of the preferred `(score, std)` pair; the first one wins complete
/// ties.
pub fn best_candidate<I>(candidates: I) -> Option<usize>
where
    I: IntoIterator<Item = (f64, f64)>,
{
    let mut best: Option<(usize, f64, f64)> = None;
    for (i, (score, std)) in candidates.into_iter().enumerate() {
        match best {
            Some((_, best_score, best_std))
                if compare_candidates(score, std, best_score, best_std) != Ordering::Greater => {}
            _ => best = Some((i, score, std)),
        }
    }
    best.map(|(i, ..)| i)
}

// ---------- normal distribution helpers ----------

/// Standard normal cumulative distribution function (Abramowitz & Stegun 26.2.17).
fn norm_cdf(x: f64) -> f64 {
    if x >= 8.0 {
        return 1.0;
    }
    if x <= -8.0 {
        return 0.0;
    }

    let a1 = 0.254829592_f64;
    let a2 = -0.284496736_f64;
    let a3 = 1.421413741_f64;
    let a4 = -1.453152027_f64;
    let a5 = 1.061405429_f64;
    let p = 0.3275911_f64;

    // erf-based: Φ(x) = (1 + erf(x / √2)) / 2
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let u = x.abs() / std::f64::consts::SQRT_2;
    let t = 1.0 / (1.0 + p * u);
    let erf = 1.0 - (((((a5 * t + a4) * t) + a3) * t + a2) * t + a1) * t * (-u * u).exp();

    0.5 * (1.0 + sign * erf)
}

/// Standard normal probability density function.
fn norm_pdf(x: f64) -> f64 {
    const INV_SQRT_2PI: f64 = 0.398_942_280_401_432_7;
    INV_SQRT_2PI * (-0.5 * x * x).exp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn ei_is_zero_at_known_optimum() {
        // std == 0 and mean equal to the current best: nothing to gain.
        assert_eq!(expected_improvement(1.5, 0.0, 1.5, 0.0), 0.0);
        assert_eq!(expected_improvement(1.5, 0.0, 1.5, 0.01), 0.0);
        let config = AcquisitionConfig::expected_improvement();
        assert_eq!(config.score(0.2, 0.0, 0.2), 0.0);
        // A worse mean with no uncertainty is also worthless.
        assert_eq!(expected_improvement(2.0, 0.0, 1.5, 0.0), 0.0);
        // A certain improvement is worth exactly the improvement.
        assert_eq!(expected_improvement(1.0, 0.0, 1.5, 0.0), 0.5);
    }

    #[test]
    fn ei_grows_with_uncertainty() {
        let low = expected_improvement(1.0, 0.1, 1.0, 0.0);
        let high = expected_improvement(1.0, 0.5, 1.0, 0.0);
        assert!(low > 0.0);
        assert!(high > low);
        // At mean == best, EI = std * φ(0).
        assert_abs_diff_eq!(high, 0.5 * norm_pdf(0.0), epsilon = 1e-6);
    }

    #[test]
    fn lcb_is_monotonic_in_exploration_weight() {
        let explored = (0.5, 0.01);
        let unexplored = (0.6, 0.3);
        let prefers = |kappa: f64| {
            let config = AcquisitionConfig::lower_confidence_bound().with_exploration_weight(kappa);
            config.score(unexplored.0, unexplored.1, 0.0) > config.score(explored.0, explored.1, 0.0)
        };
        assert!(!prefers(0.0));
        assert!(prefers(1.5));
        assert!(prefers(5.0));

        let mut previous = f64::NEG_INFINITY;
        for kappa in [0.0, 0.5, 1.0, 2.0, 4.0] {
            let s = score(AcquisitionKind::LowerConfidenceBound, 0.6, 0.3, 0.0, kappa);
            assert!(s > previous);
            previous = s;
        }
        assert_eq!(lower_confidence_bound(1.0, 0.5, 2.0), 0.0);
    }

    #[test]
    fn pi_limits() {
        assert_eq!(probability_of_improvement(1.0, 0.0, 2.0, 0.0), 1.0);
        assert_eq!(probability_of_improvement(2.0, 0.0, 2.0, 0.0), 0.0);
        assert_abs_diff_eq!(probability_of_improvement(2.0, 1.0, 2.0, 0.0), 0.5, epsilon = 1e-7);
    }

    #[test]
    fn batch_matches_single_point_scoring() {
        let prediction = Prediction {
            mean: vec![0.3, 0.1, 0.9, f64::NAN],
            std: vec![0.2, 0.0, 0.5, 0.1],
        };
        for config in [
            AcquisitionConfig::expected_improvement(),
            AcquisitionConfig::lower_confidence_bound(),
            AcquisitionConfig::probability_of_improvement(),
        ] {
            let batch = config.score_batch(&prediction, 0.25);
            for i in 0..3 {
                assert_eq!(batch[i], config.score(prediction.mean[i], prediction.std[i], 0.25));
            }
            assert_eq!(batch[3], f64::NEG_INFINITY);
        }
    }

    #[test]
    fn ties_prefer_higher_uncertainty_then_order() {
        assert_eq!(best_candidate([(0.5, 0.1), (0.5, 0.3), (0.4, 0.9)]), Some(1));
        assert_eq!(best_candidate([(0.5, 0.2), (0.5 + 1e-15, 0.2), (0.4, 0.9)]), Some(0));
        assert_eq!(best_candidate([(0.1, 0.0), (0.7, 0.0), (0.2, 0.0)]), Some(1));
        assert_eq!(best_candidate([(0.5 + 1e-14, 0.1), (0.5, 0.2)]), Some(1));
        assert_eq!(best_candidate(std::iter::empty::<(f64, f64)>()), None);
    }

    #[test]
    fn validate_rejects_negative_weight() {
        assert!(AcquisitionConfig::default().validate().is_ok());
        assert!(AcquisitionConfig::lower_confidence_bound()
            .with_exploration_weight(-1.0)
            .validate()
            .is_err());
        assert!(AcquisitionConfig::expected_improvement()
            .with_exploration_weight(f64::NAN)
            .validate()
            .is_err());
    }

    #[test]
    fn normal_cdf_accuracy() {
        assert_abs_diff_eq!(norm_cdf(0.0), 0.5, epsilon = 1e-8);
        assert_abs_diff_eq!(norm_cdf(1.0), 0.841_344_746, epsilon = 1e-6);
        assert_abs_diff_eq!(norm_cdf(-1.96), 0.024_997_895, epsilon = 1e-6);
    }
}
