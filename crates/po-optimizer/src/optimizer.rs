//! The ask/tell state machine.

use std::fmt;

use po_learning::{GaussianProcess, Surrogate};
use po_space::Space;
use po_types::{
    best_index, internal_error, validation_error, Observation, ParamValue, Point, PoResult,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::OptimizerConfig;
use crate::proposer::{CandidateProposer, EncodedHistory};
use crate::result::OptimizeResult;

/// Where the optimizer is in its run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Too few observations for a surrogate; `ask` samples the space.
    Warmup,
    /// The surrogate drives proposals. Never left once entered.
    ModelDriven,
}

/// Sequential model-based optimizer driven by `ask` and `tell`.
///
/// The caller evaluates the objective between the two calls. All
/// randomness comes from one generator seeded from the config, so two
/// optimizers with equal space, config and tells produce equal asks.
pub struct Optimizer {
    space: Space,
    config: OptimizerConfig,
    history: Vec<Observation>,
    encoded: EncodedHistory,
    surrogate: Box<dyn Surrogate>,
    proposer: CandidateProposer,
    rng: ChaCha8Rng,
    phase: Phase,
    needs_refit: bool,
}

impl fmt::Debug for Optimizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Optimizer")
            .field("space", &self.space)
            .field("config", &self.config)
            .field("observations", &self.history.len())
            .field("surrogate", &self.surrogate.name())
            .field("phase", &self.phase)
            .field("needs_refit", &self.needs_refit)
            .finish()
    }
}

impl Optimizer {
    /// Optimizer with a default Gaussian-process surrogate.
    pub fn new(space: Space, config: OptimizerConfig) -> PoResult<Self> {
        Self::with_surrogate(space, config, Box::new(GaussianProcess::default()))
    }

    pub fn with_surrogate(
        space: Space,
        config: OptimizerConfig,
        surrogate: Box<dyn Surrogate>,
    ) -> PoResult<Self> {
        config.validate()?;
        if config.warmup_count < surrogate.min_distinct_points() {
            warn!(
                warmup_count = config.warmup_count,
                required = surrogate.min_distinct_points(),
                surrogate = surrogate.name(),
                "warm-up is shorter than the surrogate's minimum; the first fit may be underdetermined"
            );
        }
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Ok(Self {
            proposer: CandidateProposer::new(config.proposer.clone()),
            space,
            config,
            history: Vec::new(),
            encoded: EncodedHistory::new(),
            surrogate,
            rng,
            phase: Phase::Warmup,
            needs_refit: false,
        })
    }

    /// Next `n` points to evaluate.
    ///
    /// During warm-up these are prior samples from the space. Afterwards
    /// the surrogate is refitted (if anything was told since the last fit)
    /// and the proposer picks them; the batch can then be shorter than `n`.
    pub fn ask(&mut self, n: usize) -> PoResult<Vec<Point>> {
        match self.phase {
            Phase::Warmup => {
                debug!(n, observations = self.history.len(), "warm-up sampling");
                Ok(self.space.sample_many(n, &mut self.rng))
            }
            Phase::ModelDriven => {
                self.refit_if_needed()?;
                let batch = self.proposer.propose(
                    self.surrogate.as_ref(),
                    &self.config.acquisition,
                    &self.space,
                    &self.encoded,
                    &mut self.rng,
                    n,
                )?;
                debug!(
                    requested = n,
                    proposed = batch.len(),
                    observations = self.history.len(),
                    "model-driven proposal"
                );
                Ok(batch)
            }
        }
    }

    pub fn ask_one(&mut self) -> PoResult<Point> {
        self.ask(1)?
            .pop()
            .ok_or_else(|| internal_error!("proposer returned no candidate"))
    }

    /// Record an evaluated point. Points need not come from `ask`.
    ///
    /// Never fits the surrogate; the refit waits for the next model-driven
    /// `ask`.
    pub fn tell(&mut self, point: Point, value: f64) -> PoResult<()> {
        let encoded = self.check_observation(&point, value)?;
        self.record(point, encoded, value);
        Ok(())
    }

    /// Record several evaluations at once. Either all are recorded or,
    /// on any invalid entry, none are.
    pub fn tell_many(&mut self, points: Vec<Point>, values: Vec<f64>) -> PoResult<()> {
        if points.len() != values.len() {
            return Err(validation_error!(
                "{} points but {} values",
                points.len(),
                values.len()
            ));
        }
        let encoded = points
            .iter()
            .zip(&values)
            .map(|(point, &value)| self.check_observation(point, value))
            .collect::<PoResult<Vec<_>>>()?;
        for ((point, encoded), value) in points.into_iter().zip(encoded).zip(values) {
            self.record(point, encoded, value);
        }
        Ok(())
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn space(&self) -> &Space {
        &self.space
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    pub fn history(&self) -> &[Observation] {
        &self.history
    }

    pub fn surrogate(&self) -> &dyn Surrogate {
        self.surrogate.as_ref()
    }

    /// Lowest-valued observation so far.
    pub fn best(&self) -> Option<&Observation> {
        best_index(&self.history).map(|i| &self.history[i])
    }

    /// Observations still needed before proposals become model-driven.
    pub fn warmup_remaining(&self) -> usize {
        match self.phase {
            Phase::Warmup => self.config.warmup_count.saturating_sub(self.history.len()),
            Phase::ModelDriven => 0,
        }
    }

    pub fn result(&self) -> PoResult<OptimizeResult> {
        OptimizeResult::from_history(&self.space, &self.history)
    }

    /// Capture everything needed to resume this run elsewhere.
    pub fn snapshot(&self) -> OptimizerSnapshot {
        OptimizerSnapshot {
            space: self.space.clone(),
            config: self.config.clone(),
            history: self.history.clone(),
            phase: self.phase,
            rng: self.rng.clone(),
        }
    }

    /// Resume a run. The surrogate is refitted on the restored history at
    /// the next model-driven `ask`, so later asks match the snapshotted run.
    pub fn restore(snapshot: OptimizerSnapshot, surrogate: Box<dyn Surrogate>) -> PoResult<Self> {
        let OptimizerSnapshot {
            space,
            config,
            history,
            phase,
            rng,
        } = snapshot;

        let mut optimizer = Self::with_surrogate(space, config, surrogate)?;
        for obs in &history {
            let encoded = optimizer.space.encode(&obs.point)?;
            optimizer.encoded.push(encoded, obs.value);
        }
        optimizer.needs_refit = !history.is_empty();
        optimizer.history = history;
        optimizer.rng = rng;
        optimizer.phase = if phase == Phase::ModelDriven
            || optimizer.history.len() >= optimizer.config.warmup_count
        {
            Phase::ModelDriven
        } else {
            Phase::Warmup
        };
        info!(
            observations = optimizer.history.len(),
            phase = ?optimizer.phase,
            "restored optimizer from snapshot"
        );
        Ok(optimizer)
    }

    fn check_observation(&self, point: &[ParamValue], value: f64) -> PoResult<Vec<f64>> {
        self.space.validate(point)?;
        if !value.is_finite() {
            return Err(validation_error!("objective value must be finite, got {value}"));
        }
        Ok(self.space.encode(point)?)
    }

    fn record(&mut self, point: Point, encoded: Vec<f64>, value: f64) {
        let index = self.history.len();
        let during_warmup = self.phase == Phase::Warmup;
        self.history
            .push(Observation::new(index, point, value, during_warmup));
        self.encoded.push(encoded, value);
        self.needs_refit = true;
        debug!(index, value, during_warmup, "told observation");

        if self.phase == Phase::Warmup && self.history.len() >= self.config.warmup_count {
            self.phase = Phase::ModelDriven;
            info!(
                observations = self.history.len(),
                n_dims = self.space.n_dims(),
                surrogate = self.surrogate.name(),
                "warm-up complete, switching to model-driven proposals"
            );
        }
    }

    fn refit_if_needed(&mut self) -> PoResult<()> {
        if !self.needs_refit {
            return Ok(());
        }
        self.surrogate.fit(&self.encoded.x, &self.encoded.y)?;
        self.needs_refit = false;
        debug!(
            n_points = self.encoded.len(),
            n_dims = self.space.encoded_dims(),
            surrogate = self.surrogate.name(),
            "refitted surrogate"
        );
        Ok(())
    }
}

/// Serializable optimizer state, including the exact generator position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerSnapshot {
    pub space: Space,
    pub config: OptimizerConfig,
    pub history: Vec<Observation>,
    pub phase: Phase,
    rng: ChaCha8Rng,
}

impl OptimizerSnapshot {
    pub fn to_json(&self) -> PoResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> PoResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::AcquisitionConfig;
    use crate::proposer::ProposerConfig;
    use po_learning::Prediction;
    use po_space::encoded_distance;
    use po_types::{real_point, InvalidPointError, PoError, SurrogateError, SurrogateResult};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Counts calls; predicts the coordinate sum with fixed uncertainty.
    struct CountingSurrogate {
        fits: Arc<AtomicUsize>,
        predicts: Arc<AtomicUsize>,
    }

    impl Surrogate for CountingSurrogate {
        fn fit(&mut self, _x: &[Vec<f64>], _y: &[f64]) -> SurrogateResult<()> {
            self.fits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn predict(&self, x: &[Vec<f64>]) -> SurrogateResult<Prediction> {
            self.predicts.fetch_add(1, Ordering::SeqCst);
            Ok(Prediction {
                mean: x.iter().map(|row| row.iter().sum()).collect(),
                std: vec![0.1; x.len()],
            })
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    struct SingularSurrogate;

    impl Surrogate for SingularSurrogate {
        fn fit(&mut self, x: &[Vec<f64>], _y: &[f64]) -> SurrogateResult<()> {
            Err(SurrogateError::FitFailed {
                n_points: x.len(),
                n_dims: x.first().map_or(0, Vec::len),
                reason: "singular covariance".to_string(),
            })
        }

        fn predict(&self, _x: &[Vec<f64>]) -> SurrogateResult<Prediction> {
            Err(SurrogateError::NotFitted)
        }

        fn name(&self) -> &str {
            "singular"
        }
    }

    fn light_proposer() -> ProposerConfig {
        ProposerConfig::default().with_pool_size(200, 20)
    }

    fn unit_space() -> Space {
        Space::from_bounds(&[(0.0, 1.0)]).unwrap()
    }

    fn parabola(point: &[ParamValue]) -> f64 {
        (point[0].as_f64().unwrap() - 0.3).powi(2)
    }

    #[test]
    fn warmup_never_touches_surrogate() {
        let fits = Arc::new(AtomicUsize::new(0));
        let predicts = Arc::new(AtomicUsize::new(0));
        let surrogate = CountingSurrogate {
            fits: fits.clone(),
            predicts: predicts.clone(),
        };
        let config = OptimizerConfig::new(1)
            .with_warmup_count(5)
            .with_proposer(light_proposer());
        let mut opt = Optimizer::with_surrogate(unit_space(), config, Box::new(surrogate)).unwrap();

        for i in 0..5 {
            assert_eq!(opt.phase(), Phase::Warmup);
            assert_eq!(opt.warmup_remaining(), 5 - i);
            let point = opt.ask_one().unwrap();
            let value = parabola(&point);
            opt.tell(point, value).unwrap();
            assert_eq!(fits.load(Ordering::SeqCst), 0);
            assert_eq!(predicts.load(Ordering::SeqCst), 0);
        }
        assert_eq!(opt.phase(), Phase::ModelDriven);
        assert!(opt.history().iter().all(|o| o.during_warmup));

        opt.ask(1).unwrap();
        assert_eq!(fits.load(Ordering::SeqCst), 1);
        assert!(predicts.load(Ordering::SeqCst) > 0);

        // No tell in between: no redundant refit.
        opt.ask(1).unwrap();
        assert_eq!(fits.load(Ordering::SeqCst), 1);

        // Several tells: still one refit, deferred to the next ask.
        opt.tell(real_point(&[0.11]), 0.5).unwrap();
        opt.tell(real_point(&[0.12]), 0.4).unwrap();
        assert_eq!(fits.load(Ordering::SeqCst), 1);
        opt.ask(1).unwrap();
        assert_eq!(fits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn same_seed_same_asks() {
        let config = OptimizerConfig::new(17)
            .with_warmup_count(3)
            .with_proposer(light_proposer());
        let mut a = Optimizer::new(unit_space(), config.clone()).unwrap();
        let mut b = Optimizer::new(unit_space(), config).unwrap();

        for _ in 0..8 {
            let pa = a.ask_one().unwrap();
            let pb = b.ask_one().unwrap();
            assert_eq!(pa, pb);
            let value = parabola(&pa);
            a.tell(pa, value).unwrap();
            b.tell(pb, value).unwrap();
        }

        let mut c = Optimizer::new(unit_space(), OptimizerConfig::new(18)).unwrap();
        let mut d = Optimizer::new(unit_space(), OptimizerConfig::new(17)).unwrap();
        assert_ne!(c.ask(3).unwrap(), d.ask(3).unwrap());
    }

    #[test]
    fn warmup_asks_do_not_repeat() {
        let mut opt = Optimizer::new(unit_space(), OptimizerConfig::new(4)).unwrap();
        let first = opt.ask(4).unwrap();
        let second = opt.ask(4).unwrap();
        for p in &first {
            assert!(!second.contains(p));
        }
    }

    #[test]
    fn repeated_batches_avoid_told_midpoint() {
        let space = Space::from_bounds(&[(0.0, 1.0), (0.0, 1.0)]).unwrap();
        let config = OptimizerConfig::new(2)
            .with_warmup_count(3)
            .with_proposer(light_proposer());
        let mut opt = Optimizer::new(space.clone(), config).unwrap();

        let midpoint = real_point(&[0.5, 0.5]);
        fn bowl(p: &[f64]) -> f64 {
            (p[0] - 0.5).powi(2) + (p[1] - 0.5).powi(2)
        }
        opt.tell(midpoint.clone(), 0.0).unwrap();
        opt.tell(real_point(&[0.1, 0.2]), bowl(&[0.1, 0.2])).unwrap();
        opt.tell(real_point(&[0.8, 0.9]), bowl(&[0.8, 0.9])).unwrap();
        assert_eq!(opt.phase(), Phase::ModelDriven);

        let mid_encoded = space.encode(&midpoint).unwrap();
        for _ in 0..2 {
            let batch = opt.ask(5).unwrap();
            assert_eq!(batch.len(), 5);
            for point in &batch {
                let encoded = space.encode(point).unwrap();
                assert!(encoded_distance(&encoded, &mid_encoded) > 1e-6);
            }
        }
    }

    #[test]
    fn invalid_tells_are_rejected_without_side_effects() {
        let mut opt = Optimizer::new(unit_space(), OptimizerConfig::default()).unwrap();

        let err = opt.tell(real_point(&[1.5]), 1.0).unwrap_err();
        assert!(matches!(
            err,
            PoError::InvalidPoint(InvalidPointError::OutOfBounds { .. })
        ));
        let err = opt.tell(real_point(&[0.5, 0.5]), 1.0).unwrap_err();
        assert!(matches!(
            err,
            PoError::InvalidPoint(InvalidPointError::DimensionMismatch { expected: 1, actual: 2 })
        ));
        let err = opt.tell(vec![ParamValue::Integer(0)], 1.0).unwrap_err();
        assert!(matches!(err, PoError::InvalidPoint(InvalidPointError::WrongKind { .. })));
        assert!(matches!(
            opt.tell(real_point(&[0.5]), f64::NAN),
            Err(PoError::Validation(_))
        ));

        let err = opt
            .tell_many(
                vec![real_point(&[0.1]), real_point(&[2.0])],
                vec![1.0, 2.0],
            )
            .unwrap_err();
        assert!(matches!(err, PoError::InvalidPoint(_)));
        assert!(matches!(
            opt.tell_many(vec![real_point(&[0.1])], vec![1.0, 2.0]),
            Err(PoError::Validation(_))
        ));

        assert!(opt.history().is_empty());
        assert_eq!(opt.warmup_remaining(), 10);
    }

    #[test]
    fn prior_data_can_end_warmup_and_phase_never_regresses() {
        let config = OptimizerConfig::new(3)
            .with_warmup_count(3)
            .with_proposer(light_proposer());
        let mut opt = Optimizer::new(unit_space(), config).unwrap();

        let xs = [0.05, 0.5, 0.95];
        opt.tell_many(
            xs.iter().map(|&x| real_point(&[x])).collect(),
            xs.iter().map(|&x| (x - 0.3) * (x - 0.3)).collect(),
        )
        .unwrap();
        assert_eq!(opt.phase(), Phase::ModelDriven);
        assert_eq!(opt.warmup_remaining(), 0);

        for _ in 0..3 {
            let point = opt.ask_one().unwrap();
            let value = parabola(&point);
            opt.tell(point, value).unwrap();
            assert_eq!(opt.phase(), Phase::ModelDriven);
        }
        assert!(opt.history()[3..].iter().all(|o| !o.during_warmup));
        assert_eq!(opt.history().len(), 6);
    }

    #[test]
    fn underdetermined_fit_is_surfaced() {
        let config = OptimizerConfig::default().with_warmup_count(1);
        let mut opt = Optimizer::new(unit_space(), config).unwrap();
        opt.tell(real_point(&[0.4]), 1.0).unwrap();
        assert_eq!(opt.phase(), Phase::ModelDriven);
        let err = opt.ask(1).unwrap_err();
        assert!(err.is_underdetermined());

        // Repeats of one point are still a single distinct point.
        let config = OptimizerConfig::default().with_warmup_count(2);
        let mut opt = Optimizer::new(unit_space(), config).unwrap();
        opt.tell(real_point(&[0.4]), 1.0).unwrap();
        opt.tell(real_point(&[0.4]), 1.2).unwrap();
        assert!(opt.ask(1).unwrap_err().is_underdetermined());
    }

    #[test]
    fn fit_failure_is_surfaced_with_context() {
        let config = OptimizerConfig::default().with_warmup_count(2);
        let mut opt =
            Optimizer::with_surrogate(unit_space(), config, Box::new(SingularSurrogate)).unwrap();
        opt.tell(real_point(&[0.1]), 1.0).unwrap();
        opt.tell(real_point(&[0.9]), 2.0).unwrap();
        match opt.ask(1).unwrap_err() {
            PoError::Surrogate(SurrogateError::FitFailed {
                n_points, n_dims, ..
            }) => {
                assert_eq!(n_points, 2);
                assert_eq!(n_dims, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_invalid_config() {
        let config = OptimizerConfig::default().with_warmup_count(0);
        assert!(matches!(
            Optimizer::new(unit_space(), config),
            Err(PoError::Config(_))
        ));
    }

    #[test]
    fn snapshot_resumes_identically() {
        let config = OptimizerConfig::new(21)
            .with_warmup_count(3)
            .with_proposer(light_proposer());
        let mut original = Optimizer::new(unit_space(), config).unwrap();
        for _ in 0..5 {
            let point = original.ask_one().unwrap();
            let value = parabola(&point);
            original.tell(point, value).unwrap();
        }

        let snapshot = original.snapshot();
        let json = snapshot.to_json().unwrap();
        let decoded = OptimizerSnapshot::from_json(&json).unwrap();
        assert_eq!(decoded, snapshot);

        let mut resumed =
            Optimizer::restore(decoded, Box::new(GaussianProcess::default())).unwrap();
        assert_eq!(resumed.phase(), Phase::ModelDriven);
        assert_eq!(resumed.history(), original.history());

        for _ in 0..3 {
            let a = original.ask_one().unwrap();
            let b = resumed.ask_one().unwrap();
            assert_eq!(a, b);
            let value = parabola(&a);
            original.tell(a, value).unwrap();
            resumed.tell(b, value).unwrap();
        }
    }

    #[test]
    fn converges_on_shifted_parabola_with_lcb() {
        let config = OptimizerConfig::new(0)
            .with_warmup_count(2)
            .with_acquisition(AcquisitionConfig::lower_confidence_bound().with_exploration_weight(1.5))
            .with_proposer(light_proposer());
        let mut opt = Optimizer::new(unit_space(), config).unwrap();

        for _ in 0..2 {
            let point = opt.ask_one().unwrap();
            let value = parabola(&point);
            opt.tell(point, value).unwrap();
        }
        for _ in 0..30 {
            let point = opt.ask_one().unwrap();
            let value = parabola(&point);
            opt.tell(point, value).unwrap();
        }

        let best = opt.best().unwrap();
        assert!(best.value < 1e-3, "best value {}", best.value);
        let result = opt.result().unwrap();
        assert_eq!(result.n_warmup, 2);
        assert_eq!(result.fun, best.value);
    }
}
