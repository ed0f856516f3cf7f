//! # po-model-systems
//!
//! Synthetic objectives with known optima ("model systems") used to
//! validate ProcessOptimizer. Not used by the optimizer itself.

pub mod benchmarks;
mod model_system;

pub use benchmarks::{bench1, bench2, bench3, branin, BENCH3_MIN, BRANIN_MIN};
pub use model_system::{
    bench1_system, bench2_system, bench3_system, branin_hoo, ModelSystem, NoiseModel, ObjectiveFn,
};
