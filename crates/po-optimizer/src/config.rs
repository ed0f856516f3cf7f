//! Optimizer run configuration.

use serde::{Deserialize, Serialize};

use crate::acquisition::AcquisitionConfig;
use crate::proposer::ProposerConfig;
use po_types::{config_error, PoResult};

/// Default number of random evaluations before the surrogate takes over.
pub const DEFAULT_WARMUP_COUNT: usize = 10;

/// Top-level configuration for an ask/tell run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Seed for the optimizer's only random generator.
    pub seed: u64,

    /// Observations required before proposals become model-driven.
    /// Counts every told point, including prior evaluations.
    pub warmup_count: usize,

    pub acquisition: AcquisitionConfig,

    pub proposer: ProposerConfig,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self::new(0)
    }
}

impl OptimizerConfig {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            warmup_count: DEFAULT_WARMUP_COUNT,
            acquisition: AcquisitionConfig::default(),
            proposer: ProposerConfig::default(),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_warmup_count(mut self, n: usize) -> Self {
        self.warmup_count = n;
        self
    }

    pub fn with_acquisition(mut self, acquisition: AcquisitionConfig) -> Self {
        self.acquisition = acquisition;
        self
    }

    pub fn with_proposer(mut self, proposer: ProposerConfig) -> Self {
        self.proposer = proposer;
        self
    }

    pub fn validate(&self) -> PoResult<()> {
        if self.warmup_count == 0 {
            return Err(config_error!("warmup_count must be at least 1"));
        }
        self.acquisition.validate()?;
        self.proposer.validate()
    }
}
