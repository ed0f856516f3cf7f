//! # po-learning
//!
//! Surrogate models for ProcessOptimizer.
//!
//! The optimizer only depends on the [`Surrogate`] capability (`fit` /
//! `predict`); [`GaussianProcess`] is the bundled implementation.

mod gaussian_process;
mod surrogate;

pub use gaussian_process::{GaussianProcess, GpConfig, Kernel};
pub use surrogate::{count_distinct, validate_training_data, Prediction, Surrogate};
