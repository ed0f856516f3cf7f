//! # po-space
//!
//! Parameter space definitions for ProcessOptimizer.
//!
//! A [`Space`] is an ordered list of [`Dimension`]s (real, integer or
//! categorical). It converts between native points and the normalized
//! `[0, 1]` vectors the surrogate and acquisition optimizer work on, and
//! samples points from each dimension's prior with a caller-supplied RNG.

mod dimension;
mod space;

pub use dimension::{CategoricalEncoding, Dimension, DimensionKind, Prior};
pub use space::{encoded_distance, Space, SpaceBuilder};
