//! Acquisition maximization over the encoded space.
//!
//! A candidate pool mixes prior samples from the space with Gaussian
//! perturbations around the best observations. The highest-scoring pool
//! members are refined by a few rounds of shrinking local search, then a
//! batch is picked greedily while skipping anything already evaluated.

use crate::acquisition::{best_candidate, compare_candidates, AcquisitionConfig};
use po_learning::Surrogate;
use po_space::{encoded_distance, Space};
use po_types::{config_error, internal_error, Point, PoResult};
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::{debug, warn};

/// Candidate pool and deduplication settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposerConfig {
    /// Prior samples drawn from the space per pool.
    pub n_random: usize,
    /// Perturbations per anchor, and per refinement round.
    pub n_local: usize,
    /// Best observations used as perturbation anchors.
    pub n_anchors: usize,
    /// Standard deviation of anchor perturbations in encoded units.
    pub local_scale: f64,
    /// Pool members refined by local search.
    pub n_restarts: usize,
    /// Refinement rounds; each halves the perturbation scale.
    pub refine_rounds: usize,
    /// Encoded distance at or below which a candidate counts as already evaluated.
    pub dedup_tolerance: f64,
    /// Minimum encoded distance between members of one batch.
    pub min_distance: f64,
    /// Pool regenerations allowed when the batch is not yet full.
    pub max_retries: usize,
}

impl Default for ProposerConfig {
    fn default() -> Self {
        Self {
            n_random: 500,
            n_local: 50,
            n_anchors: 3,
            local_scale: 0.05,
            n_restarts: 3,
            refine_rounds: 3,
            dedup_tolerance: 1e-6,
            min_distance: 1e-3,
            max_retries: 5,
        }
    }
}

impl ProposerConfig {
    pub fn with_pool_size(mut self, n_random: usize, n_local: usize) -> Self {
        self.n_random = n_random;
        self.n_local = n_local;
        self
    }

    pub fn with_local_search(mut self, n_restarts: usize, refine_rounds: usize) -> Self {
        self.n_restarts = n_restarts;
        self.refine_rounds = refine_rounds;
        self
    }

    pub fn with_dedup_tolerance(mut self, tolerance: f64) -> Self {
        self.dedup_tolerance = tolerance;
        self
    }

    pub fn with_min_distance(mut self, distance: f64) -> Self {
        self.min_distance = distance;
        self
    }

    pub fn with_max_retries(mut self, retries: usize) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn validate(&self) -> PoResult<()> {
        if self.n_random == 0 && (self.n_local == 0 || self.n_anchors == 0) {
            return Err(config_error!("candidate pool is empty: n_random and n_local are both zero"));
        }
        if !(self.local_scale.is_finite() && self.local_scale > 0.0) {
            return Err(config_error!("local_scale must be positive, got {}", self.local_scale));
        }
        if !(self.dedup_tolerance.is_finite() && self.dedup_tolerance > 0.0) {
            return Err(config_error!(
                "dedup_tolerance must be positive, got {}",
                self.dedup_tolerance
            ));
        }
        if !(self.min_distance.is_finite() && self.min_distance > 0.0) {
            return Err(config_error!("min_distance must be positive, got {}", self.min_distance));
        }
        Ok(())
    }
}

/// Read-only encoded view of the observation history.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EncodedHistory {
    pub x: Vec<Vec<f64>>,
    pub y: Vec<f64>,
}

impl EncodedHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, encoded: Vec<f64>, value: f64) {
        self.x.push(encoded);
        self.y.push(value);
    }

    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    pub fn best_value(&self) -> Option<f64> {
        self.y.iter().copied().reduce(f64::min)
    }

    /// Indices of the `k` lowest values, earliest first among equals.
    pub fn best_indices(&self, k: usize) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.y.len()).collect();
        order.sort_by(|&a, &b| self.y[a].total_cmp(&self.y[b]).then(a.cmp(&b)));
        order.truncate(k);
        order
    }

    /// Encoded distance to the closest observed point; infinite when empty.
    pub fn nearest_distance(&self, encoded: &[f64]) -> f64 {
        self.x
            .iter()
            .map(|seen| encoded_distance(seen, encoded))
            .fold(f64::INFINITY, f64::min)
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    encoded: Vec<f64>,
    score: f64,
    std: f64,
}

/// Picks the next points to evaluate from a fitted surrogate.
#[derive(Debug, Clone, Default)]
pub struct CandidateProposer {
    config: ProposerConfig,
}

impl CandidateProposer {
    pub fn new(config: ProposerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProposerConfig {
        &self.config
    }

    /// Propose up to `n_candidates` native points.
    ///
    /// Returns fewer than requested when the pools cannot supply enough
    /// novel, mutually distinct points within `max_retries` regenerations.
    /// If none at all is novel, the rejected candidate farthest from history
    /// is returned on its own.
    pub fn propose<R: Rng + ?Sized>(
        &self,
        surrogate: &dyn Surrogate,
        acquisition: &AcquisitionConfig,
        space: &Space,
        history: &EncodedHistory,
        rng: &mut R,
        n_candidates: usize,
    ) -> PoResult<Vec<Point>> {
        if n_candidates == 0 {
            return Ok(Vec::new());
        }
        let best_observed = history
            .best_value()
            .ok_or_else(|| internal_error!("cannot propose candidates without observations"))?;
        let anchors = history.best_indices(self.config.n_anchors);

        let mut selected: Vec<Candidate> = Vec::with_capacity(n_candidates);
        let mut nearest_miss: Option<(f64, Candidate)> = None;

        for attempt in 0..=self.config.max_retries {
            let pool = self.generate_pool(space, history, &anchors, rng)?;
            let mut remaining = score_pool(surrogate, acquisition, best_observed, pool)?;
            self.refine(surrogate, acquisition, space, best_observed, &mut remaining, rng)?;
            debug!(
                attempt,
                pool_size = remaining.len(),
                selected = selected.len(),
                "scored candidate pool"
            );

            while selected.len() < n_candidates {
                let Some(index) = preferred(&remaining) else {
                    break;
                };
                let candidate = remaining.remove(index);

                let distance = history.nearest_distance(&candidate.encoded);
                if distance <= self.config.dedup_tolerance {
                    if nearest_miss.as_ref().map_or(true, |(d, _)| distance > *d) {
                        nearest_miss = Some((distance, candidate));
                    }
                    continue;
                }
                let crowded = selected.iter().any(|s| {
                    encoded_distance(&s.encoded, &candidate.encoded) < self.config.min_distance
                });
                if !crowded {
                    selected.push(candidate);
                }
            }

            if selected.len() == n_candidates {
                break;
            }
        }

        if selected.is_empty() {
            if let Some((distance, candidate)) = nearest_miss {
                warn!(
                    distance,
                    tolerance = self.config.dedup_tolerance,
                    "no novel candidate found, accepting nearest miss"
                );
                selected.push(candidate);
            }
        } else if selected.len() < n_candidates {
            warn!(
                requested = n_candidates,
                proposed = selected.len(),
                "returning a short batch"
            );
        }

        selected
            .iter()
            .map(|c| space.decode(&c.encoded).map_err(Into::into))
            .collect()
    }

    fn generate_pool<R: Rng + ?Sized>(
        &self,
        space: &Space,
        history: &EncodedHistory,
        anchors: &[usize],
        rng: &mut R,
    ) -> PoResult<Vec<Vec<f64>>> {
        let mut pool = Vec::with_capacity(self.config.n_random + anchors.len() * self.config.n_local);
        for _ in 0..self.config.n_random {
            pool.push(space.encode(&space.sample(rng))?);
        }
        for &anchor in anchors {
            for _ in 0..self.config.n_local {
                pool.push(perturb(space, &history.x[anchor], self.config.local_scale, rng)?);
            }
        }
        Ok(pool)
    }

    /// Local search from the top pool members; refined optima are appended.
    fn refine<R: Rng + ?Sized>(
        &self,
        surrogate: &dyn Surrogate,
        acquisition: &AcquisitionConfig,
        space: &Space,
        best_observed: f64,
        pool: &mut Vec<Candidate>,
        rng: &mut R,
    ) -> PoResult<()> {
        if self.config.n_local == 0 {
            return Ok(());
        }
        // Tolerance-based ties are not transitive, so starts are picked one
        // at a time with the same rule as the final selection.
        let mut order: Vec<usize> = (0..pool.len()).collect();
        let mut starts: Vec<Candidate> = Vec::with_capacity(self.config.n_restarts);
        while starts.len() < self.config.n_restarts {
            let Some(k) = best_candidate(order.iter().map(|&i| (pool[i].score, pool[i].std))) else {
                break;
            };
            starts.push(pool[order.remove(k)].clone());
        }

        for mut current in starts {
            let mut scale = self.config.local_scale;
            for _ in 0..self.config.refine_rounds {
                scale *= 0.5;
                let probes = (0..self.config.n_local)
                    .map(|_| perturb(space, &current.encoded, scale, rng))
                    .collect::<PoResult<Vec<_>>>()?;
                let probes = score_pool(surrogate, acquisition, best_observed, probes)?;
                if let Some(i) = preferred(&probes) {
                    if compare_candidates(probes[i].score, probes[i].std, current.score, current.std)
                        == Ordering::Greater
                    {
                        current = probes[i].clone();
                    }
                }
            }
            pool.push(current);
        }
        Ok(())
    }
}

fn score_pool(
    surrogate: &dyn Surrogate,
    acquisition: &AcquisitionConfig,
    best_observed: f64,
    pool: Vec<Vec<f64>>,
) -> PoResult<Vec<Candidate>> {
    if pool.is_empty() {
        return Ok(Vec::new());
    }
    let prediction = surrogate.predict(&pool)?;
    let scores = acquisition.score_batch(&prediction, best_observed);
    Ok(pool
        .into_iter()
        .zip(scores)
        .zip(prediction.std)
        .map(|((encoded, score), std)| Candidate { encoded, score, std })
        .collect())
}

/// Gaussian step around `center`, clipped to the unit cube and snapped
/// onto encodings of valid native points.
fn perturb<R: Rng + ?Sized>(
    space: &Space,
    center: &[f64],
    scale: f64,
    rng: &mut R,
) -> PoResult<Vec<f64>> {
    let moved: Vec<f64> = center
        .iter()
        .map(|c| {
            let step: f64 = rng.sample(StandardNormal);
            (c + scale * step).clamp(0.0, 1.0)
        })
        .collect();
    Ok(space.snap(&moved)?)
}

fn preferred(candidates: &[Candidate]) -> Option<usize> {
    best_candidate(candidates.iter().map(|c| (c.score, c.std)))
}
