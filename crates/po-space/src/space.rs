//! The full parameter space and its encoder.

use po_types::{config_error, InvalidPointError, ParamValue, PoError, PoResult, Point};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::dimension::Dimension;

/// An ordered, validated sequence of dimensions.
///
/// Native points are `Vec<ParamValue>` in dimension order. Encoded points
/// are `Vec<f64>` of length [`Space::encoded_dims`] with every component in
/// [0, 1]. A space is immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Dimension>", into = "Vec<Dimension>")]
pub struct Space {
    dimensions: Vec<Dimension>,
    /// Start of each dimension's slice in the encoded vector.
    offsets: Vec<usize>,
    encoded_dims: usize,
}

impl Space {
    /// Validate `dimensions` and build a space from them.
    pub fn new(dimensions: Vec<Dimension>) -> PoResult<Self> {
        if dimensions.is_empty() {
            return Err(config_error!("a space needs at least one dimension"));
        }
        for (i, dim) in dimensions.iter().enumerate() {
            dim.validate()?;
            if dimensions[..i].iter().any(|d| d.name == dim.name) {
                return Err(config_error!("duplicate dimension name '{}'", dim.name));
            }
        }

        let mut offsets = Vec::with_capacity(dimensions.len());
        let mut encoded_dims = 0;
        for dim in &dimensions {
            offsets.push(encoded_dims);
            encoded_dims += dim.encoded_len();
        }

        Ok(Self {
            dimensions,
            offsets,
            encoded_dims,
        })
    }

    pub fn builder() -> SpaceBuilder {
        SpaceBuilder::default()
    }

    /// All-real space from `(low, high)` pairs, named `x0`, `x1`, ...
    pub fn from_bounds(bounds: &[(f64, f64)]) -> PoResult<Self> {
        Self::new(
            bounds
                .iter()
                .enumerate()
                .map(|(i, (low, high))| Dimension::real(format!("x{i}"), *low, *high))
                .collect(),
        )
    }

    pub fn n_dims(&self) -> usize {
        self.dimensions.len()
    }

    /// Length of an encoded vector.
    pub fn encoded_dims(&self) -> usize {
        self.encoded_dims
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    pub fn dimension(&self, index: usize) -> Option<&Dimension> {
        self.dimensions.get(index)
    }

    pub fn names(&self) -> Vec<&str> {
        self.dimensions.iter().map(|d| d.name.as_str()).collect()
    }

    /// Check arity, kinds and bounds of a native point.
    pub fn validate(&self, point: &[ParamValue]) -> Result<(), InvalidPointError> {
        self.check_arity(point)?;
        for (dim, value) in self.dimensions.iter().zip(point) {
            dim.check(value)?;
        }
        Ok(())
    }

    pub fn contains(&self, point: &[ParamValue]) -> bool {
        self.validate(point).is_ok()
    }

    /// Native point to encoded vector.
    pub fn encode(&self, point: &[ParamValue]) -> Result<Vec<f64>, InvalidPointError> {
        self.check_arity(point)?;
        let mut out = Vec::with_capacity(self.encoded_dims);
        for (dim, value) in self.dimensions.iter().zip(point) {
            dim.encode_into(value, &mut out)?;
        }
        Ok(out)
    }

    pub fn encode_batch(&self, points: &[Point]) -> Result<Vec<Vec<f64>>, InvalidPointError> {
        points.iter().map(|p| self.encode(p)).collect()
    }

    /// Encoded vector to the nearest valid native point.
    ///
    /// Numeric components are clamped into range and integers rounded;
    /// categorical slices resolve to their argmax (one-hot) or nearest
    /// category (ordinal).
    pub fn decode(&self, encoded: &[f64]) -> Result<Point, InvalidPointError> {
        if encoded.len() != self.encoded_dims {
            return Err(InvalidPointError::EncodedLength {
                expected: self.encoded_dims,
                actual: encoded.len(),
            });
        }
        Ok(self
            .dimensions
            .iter()
            .zip(&self.offsets)
            .map(|(dim, &start)| dim.decode(&encoded[start..start + dim.encoded_len()]))
            .collect())
    }

    /// Project an arbitrary encoded vector onto the encodings of valid
    /// native points (decode, then encode).
    pub fn snap(&self, encoded: &[f64]) -> Result<Vec<f64>, InvalidPointError> {
        let point = self.decode(encoded)?;
        self.encode(&point)
    }

    /// Draw one point, dimension by dimension, from each prior.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Point {
        self.dimensions.iter().map(|d| d.sample(rng)).collect()
    }

    pub fn sample_many<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Vec<Point> {
        (0..n).map(|_| self.sample(rng)).collect()
    }

    fn check_arity(&self, point: &[ParamValue]) -> Result<(), InvalidPointError> {
        if point.len() != self.dimensions.len() {
            return Err(InvalidPointError::DimensionMismatch {
                expected: self.dimensions.len(),
                actual: point.len(),
            });
        }
        Ok(())
    }
}

impl TryFrom<Vec<Dimension>> for Space {
    type Error = PoError;

    fn try_from(dimensions: Vec<Dimension>) -> PoResult<Self> {
        Self::new(dimensions)
    }
}

impl From<Space> for Vec<Dimension> {
    fn from(space: Space) -> Self {
        space.dimensions
    }
}

/// Euclidean distance between two encoded vectors.
pub fn encoded_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// Chained construction of a [`Space`].
#[derive(Debug, Clone, Default)]
pub struct SpaceBuilder {
    dimensions: Vec<Dimension>,
}

impl SpaceBuilder {
    pub fn real(mut self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.dimensions.push(Dimension::real(name, low, high));
        self
    }

    pub fn log_real(mut self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.dimensions.push(Dimension::log_real(name, low, high));
        self
    }

    pub fn integer(mut self, name: impl Into<String>, low: i64, high: i64) -> Self {
        self.dimensions.push(Dimension::integer(name, low, high));
        self
    }

    pub fn log_integer(mut self, name: impl Into<String>, low: i64, high: i64) -> Self {
        self.dimensions.push(Dimension::log_integer(name, low, high));
        self
    }

    pub fn categorical<V: Into<serde_json::Value>>(
        mut self,
        name: impl Into<String>,
        categories: impl IntoIterator<Item = V>,
    ) -> Self {
        self.dimensions.push(Dimension::categorical(name, categories));
        self
    }

    pub fn ordinal_categorical<V: Into<serde_json::Value>>(
        mut self,
        name: impl Into<String>,
        categories: impl IntoIterator<Item = V>,
    ) -> Self {
        self.dimensions
            .push(Dimension::ordinal_categorical(name, categories));
        self
    }

    pub fn dimension(mut self, dimension: Dimension) -> Self {
        self.dimensions.push(dimension);
        self
    }

    pub fn build(self) -> PoResult<Space> {
        Space::new(self.dimensions)
    }
}
