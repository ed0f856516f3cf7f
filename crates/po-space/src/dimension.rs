//! Single parameter axes and their per-axis encoding.

use po_types::{config_error, InvalidPointError, ParamValue, PoResult};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Sampling prior and encoding transform for numeric dimensions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Prior {
    /// Min-max scaled directly.
    #[default]
    Uniform,
    /// Log-transformed, then min-max scaled; sampled log-uniformly.
    LogUniform,
}

/// How a categorical dimension is laid out in the encoded vector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CategoricalEncoding {
    /// One component per category; decoded by argmax.
    #[default]
    OneHot,
    /// A single component holding `index / (n - 1)`; decoded to the
    /// nearest category.
    Ordinal,
}

/// Describes the domain of one dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DimensionKind {
    /// Continuous range [low, high].
    Real { low: f64, high: f64, prior: Prior },
    /// Integer range [low, high] inclusive.
    Integer { low: i64, high: i64, prior: Prior },
    /// Unordered set of choices.
    Categorical {
        categories: Vec<serde_json::Value>,
        encoding: CategoricalEncoding,
    },
}

/// A single named parameter axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    /// Human-readable parameter name (e.g. "temperature").
    pub name: String,
    pub kind: DimensionKind,
}

impl Dimension {
    pub fn real(name: impl Into<String>, low: f64, high: f64) -> Self {
        Self {
            name: name.into(),
            kind: DimensionKind::Real {
                low,
                high,
                prior: Prior::Uniform,
            },
        }
    }

    pub fn log_real(name: impl Into<String>, low: f64, high: f64) -> Self {
        Self {
            name: name.into(),
            kind: DimensionKind::Real {
                low,
                high,
                prior: Prior::LogUniform,
            },
        }
    }

    pub fn integer(name: impl Into<String>, low: i64, high: i64) -> Self {
        Self {
            name: name.into(),
            kind: DimensionKind::Integer {
                low,
                high,
                prior: Prior::Uniform,
            },
        }
    }

    pub fn log_integer(name: impl Into<String>, low: i64, high: i64) -> Self {
        Self {
            name: name.into(),
            kind: DimensionKind::Integer {
                low,
                high,
                prior: Prior::LogUniform,
            },
        }
    }

    pub fn categorical<V: Into<serde_json::Value>>(
        name: impl Into<String>,
        categories: impl IntoIterator<Item = V>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: DimensionKind::Categorical {
                categories: categories.into_iter().map(Into::into).collect(),
                encoding: CategoricalEncoding::OneHot,
            },
        }
    }

    pub fn ordinal_categorical<V: Into<serde_json::Value>>(
        name: impl Into<String>,
        categories: impl IntoIterator<Item = V>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: DimensionKind::Categorical {
                categories: categories.into_iter().map(Into::into).collect(),
                encoding: CategoricalEncoding::Ordinal,
            },
        }
    }

    /// Check that the declared domain is usable.
    pub fn validate(&self) -> PoResult<()> {
        if self.name.trim().is_empty() {
            return Err(config_error!("dimension names must not be empty"));
        }
        match &self.kind {
            DimensionKind::Real { low, high, prior } => {
                if !low.is_finite() || !high.is_finite() {
                    return Err(config_error!("dimension '{}': bounds must be finite", self.name));
                }
                if low >= high {
                    return Err(config_error!(
                        "dimension '{}': low ({low}) must be below high ({high})",
                        self.name
                    ));
                }
                if *prior == Prior::LogUniform && *low <= 0.0 {
                    return Err(config_error!(
                        "dimension '{}': log-uniform prior needs a positive lower bound",
                        self.name
                    ));
                }
            }
            DimensionKind::Integer { low, high, prior } => {
                if low > high {
                    return Err(config_error!(
                        "dimension '{}': low ({low}) must not exceed high ({high})",
                        self.name
                    ));
                }
                if *prior == Prior::LogUniform && *low < 1 {
                    return Err(config_error!(
                        "dimension '{}': log-uniform prior needs a lower bound of at least 1",
                        self.name
                    ));
                }
            }
            DimensionKind::Categorical { categories, .. } => {
                if categories.is_empty() {
                    return Err(config_error!("dimension '{}': no categories", self.name));
                }
                for (i, category) in categories.iter().enumerate() {
                    if categories[..i].contains(category) {
                        return Err(config_error!(
                            "dimension '{}': duplicate category {category}",
                            self.name
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    /// Number of components this dimension occupies in the encoded vector.
    pub fn encoded_len(&self) -> usize {
        match &self.kind {
            DimensionKind::Categorical {
                categories,
                encoding: CategoricalEncoding::OneHot,
            } => categories.len(),
            _ => 1,
        }
    }

    /// Validate a native value against this dimension.
    pub fn check(&self, value: &ParamValue) -> Result<(), InvalidPointError> {
        self.category_index_or_number(value).map(|_| ())
    }

    /// Append the encoding of `value` to `out`.
    pub fn encode_into(&self, value: &ParamValue, out: &mut Vec<f64>) -> Result<(), InvalidPointError> {
        let checked = self.category_index_or_number(value)?;
        match (&self.kind, checked) {
            (DimensionKind::Real { low, high, prior }, Checked::Number(x)) => {
                out.push(to_unit(x, *low, *high, *prior));
            }
            (DimensionKind::Integer { low, high, prior }, Checked::Number(x)) => {
                out.push(to_unit(x, *low as f64, *high as f64, *prior));
            }
            (
                DimensionKind::Categorical {
                    categories,
                    encoding,
                },
                Checked::Category(idx),
            ) => match encoding {
                CategoricalEncoding::OneHot => {
                    out.extend((0..categories.len()).map(|i| if i == idx { 1.0 } else { 0.0 }));
                }
                CategoricalEncoding::Ordinal => {
                    out.push(ordinal_position(idx, categories.len()));
                }
            },
            (kind, _) => {
                return Err(InvalidPointError::WrongKind {
                    dimension: self.name.clone(),
                    expected: kind_name(kind).to_string(),
                    actual: value.kind_name().to_string(),
                })
            }
        }
        Ok(())
    }

    /// Map an encoded slice (exactly `encoded_len` long) back to the nearest
    /// valid native value. Out-of-range components are clamped.
    pub fn decode(&self, encoded: &[f64]) -> ParamValue {
        match &self.kind {
            DimensionKind::Real { low, high, prior } => {
                ParamValue::Real(decode_real(encoded[0], *low, *high, *prior))
            }
            DimensionKind::Integer { low, high, prior } => {
                let x = from_unit(encoded[0], *low as f64, *high as f64, *prior);
                ParamValue::Integer((x.round() as i64).clamp(*low, *high))
            }
            DimensionKind::Categorical {
                categories,
                encoding,
            } => {
                let idx = match encoding {
                    CategoricalEncoding::OneHot => argmax(encoded),
                    CategoricalEncoding::Ordinal => {
                        let last = categories.len() - 1;
                        let t = unit_clamp(encoded[0]);
                        ((t * last as f64).round() as usize).min(last)
                    }
                };
                ParamValue::Category(categories[idx].clone())
            }
        }
    }

    /// Draw a value from this dimension's prior.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> ParamValue {
        match &self.kind {
            // Uniform in encoded space is the prior; decoding keeps the
            // draw on values that round-trip exactly.
            DimensionKind::Real { low, high, prior } => {
                ParamValue::Real(decode_real(rng.gen::<f64>(), *low, *high, *prior))
            }
            DimensionKind::Integer { low, high, prior } => match prior {
                Prior::Uniform => ParamValue::Integer(rng.gen_range(*low..=*high)),
                Prior::LogUniform => {
                    if low == high {
                        return ParamValue::Integer(*low);
                    }
                    let log_val: f64 = rng.gen_range((*low as f64).ln()..=(*high as f64).ln());
                    ParamValue::Integer((log_val.exp().round() as i64).clamp(*low, *high))
                }
            },
            DimensionKind::Categorical { categories, .. } => {
                let idx = rng.gen_range(0..categories.len());
                ParamValue::Category(categories[idx].clone())
            }
        }
    }

    fn category_index_or_number(&self, value: &ParamValue) -> Result<Checked, InvalidPointError> {
        match (&self.kind, value) {
            (DimensionKind::Real { low, high, .. }, ParamValue::Real(x)) => {
                self.check_number(*x, *low, *high)?;
                Ok(Checked::Number(*x))
            }
            (DimensionKind::Integer { low, high, .. }, ParamValue::Integer(x)) => {
                self.check_number(*x as f64, *low as f64, *high as f64)?;
                Ok(Checked::Number(*x as f64))
            }
            (DimensionKind::Categorical { categories, .. }, ParamValue::Category(v)) => categories
                .iter()
                .position(|c| c == v)
                .map(Checked::Category)
                .ok_or_else(|| InvalidPointError::UnknownCategory {
                    dimension: self.name.clone(),
                    value: v.to_string(),
                }),
            (kind, other) => Err(InvalidPointError::WrongKind {
                dimension: self.name.clone(),
                expected: kind_name(kind).to_string(),
                actual: other.kind_name().to_string(),
            }),
        }
    }

    fn check_number(&self, x: f64, low: f64, high: f64) -> Result<(), InvalidPointError> {
        if !x.is_finite() {
            return Err(InvalidPointError::NonFinite {
                dimension: self.name.clone(),
            });
        }
        if x < low || x > high {
            return Err(InvalidPointError::OutOfBounds {
                dimension: self.name.clone(),
                value: x,
                low,
                high,
            });
        }
        Ok(())
    }
}

enum Checked {
    Number(f64),
    Category(usize),
}

fn kind_name(kind: &DimensionKind) -> &'static str {
    match kind {
        DimensionKind::Real { .. } => "real",
        DimensionKind::Integer { .. } => "integer",
        DimensionKind::Categorical { .. } => "categorical",
    }
}

/// Clamp to [0, 1]; NaN maps to 0.
fn unit_clamp(t: f64) -> f64 {
    if t.is_nan() {
        0.0
    } else {
        t.clamp(0.0, 1.0)
    }
}

fn to_unit(x: f64, low: f64, high: f64, prior: Prior) -> f64 {
    let (x, low, high) = match prior {
        Prior::Uniform => (x, low, high),
        Prior::LogUniform => (x.ln(), low.ln(), high.ln()),
    };
    // Single-valued integer ranges
    if high <= low {
        return 0.0;
    }
    unit_clamp((x - low) / (high - low))
}

fn from_unit(t: f64, low: f64, high: f64, prior: Prior) -> f64 {
    let t = unit_clamp(t);
    if t <= 0.0 {
        return low;
    }
    if t >= 1.0 {
        return high;
    }
    let x = match prior {
        Prior::Uniform => low + t * (high - low),
        Prior::LogUniform => {
            let (log_low, log_high) = (low.ln(), high.ln());
            (log_low + t * (log_high - log_low)).exp()
        }
    };
    x.clamp(low, high)
}

/// Steps tried when searching for an exact preimage of an encoded value.
const PREIMAGE_SEARCH_STEPS: usize = 64;

/// Inverse of [`to_unit`] for real dimensions, canonicalized so that
/// `to_unit(decode_real(t)) == t` whenever some float encodes to `t`, and
/// so that every float sharing one encoding decodes to the same value (the
/// lowest of them). Together these make `decode(encode(x)) == x` for every
/// value this function returns, in particular for every sampled value.
fn decode_real(t: f64, low: f64, high: f64, prior: Prior) -> f64 {
    let t = unit_clamp(t);
    let mut x = from_unit(t, low, high, prior);
    if t <= 0.0 || t >= 1.0 {
        return x;
    }

    let mut encoded = to_unit(x, low, high, prior);
    if encoded != t {
        let up = encoded < t;
        let mut current = x;
        for _ in 0..PREIMAGE_SEARCH_STEPS {
            let next = next_float(current, up);
            if next < low || next > high {
                break;
            }
            let e = to_unit(next, low, high, prior);
            if e == t {
                x = next;
                encoded = e;
                break;
            }
            if (up && e > t) || (!up && e < t) {
                break;
            }
            current = next;
        }
    }

    for _ in 0..PREIMAGE_SEARCH_STEPS {
        let below = next_float(x, false);
        if below < low || to_unit(below, low, high, prior) != encoded {
            break;
        }
        x = below;
    }
    x
}

/// Adjacent representable value above (`up`) or below a finite `x`.
fn next_float(x: f64, up: bool) -> f64 {
    if x == 0.0 {
        let tiny = f64::from_bits(1);
        return if up { tiny } else { -tiny };
    }
    let bits = x.to_bits();
    if (x > 0.0) == up {
        f64::from_bits(bits + 1)
    } else {
        f64::from_bits(bits - 1)
    }
}

fn ordinal_position(idx: usize, n: usize) -> f64 {
    if n <= 1 {
        0.0
    } else {
        idx as f64 / (n - 1) as f64
    }
}

/// Index of the largest component; the first one wins ties.
fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn encode(dim: &Dimension, value: &ParamValue) -> Vec<f64> {
        let mut out = Vec::new();
        dim.encode_into(value, &mut out).unwrap();
        out
    }

    #[test]
    fn real_round_trip() {
        let dim = Dimension::real("temperature", 20.0, 80.0);
        for x in [20.0, 33.3, 50.0, 79.99, 80.0] {
            let encoded = encode(&dim, &ParamValue::Real(x));
            assert!(encoded[0] >= 0.0 && encoded[0] <= 1.0);
            let back = dim.decode(&encoded).as_f64().unwrap();
            assert_relative_eq!(back, x, max_relative = 1e-12);
        }
        assert_eq!(dim.decode(&[0.0]), ParamValue::Real(20.0));
        assert_eq!(dim.decode(&[1.0]), ParamValue::Real(80.0));
    }

    #[test]
    fn sampled_reals_round_trip_bit_exactly() {
        let dims = [
            Dimension::real("a", -5.0, 10.0),
            Dimension::log_real("b", 1e-3, 7.0),
            Dimension::log_real("c", 0.1, 1e6),
            Dimension::real("d", 0.1, 0.3),
        ];
        let mut rng = ChaCha8Rng::seed_from_u64(17);
        for dim in &dims {
            for _ in 0..10_000 {
                let value = dim.sample(&mut rng);
                let back = dim.decode(&encode(dim, &value));
                assert_eq!(back, value, "{}", dim.name);
            }
        }
    }

    #[test]
    fn values_sharing_an_encoding_decode_to_one_value() {
        let dim = Dimension::log_real("c", 0.1, 1e6);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        for _ in 0..1_000 {
            let x = dim.sample(&mut rng).as_f64().unwrap();
            let neighbour = next_float(x, true);
            if neighbour > 1e6 {
                continue;
            }
            let encoded = encode(&dim, &ParamValue::Real(neighbour));
            let decoded = dim.decode(&encoded).as_f64().unwrap();
            assert_eq!(to_unit(decoded, 0.1, 1e6, Prior::LogUniform), encoded[0]);
            assert_eq!(dim.decode(&encode(&dim, &ParamValue::Real(decoded))).as_f64(), Some(decoded));
        }
    }

    #[test]
    fn next_float_steps_one_ulp() {
        assert_eq!(next_float(1.0, true), 1.0 + f64::EPSILON);
        assert_eq!(next_float(1.0 + f64::EPSILON, false), 1.0);
        assert_eq!(next_float(-1.0, false), -1.0 - f64::EPSILON);
        assert!(next_float(0.0, true) > 0.0);
        assert!(next_float(0.0, false) < 0.0);
    }

    #[test]
    fn log_real_scales_logarithmically() {
        let dim = Dimension::log_real("rate", 1e-4, 1.0);
        let encoded = encode(&dim, &ParamValue::Real(1e-2));
        assert_relative_eq!(encoded[0], 0.5, epsilon = 1e-12);
        let back = dim.decode(&encoded).as_f64().unwrap();
        assert_relative_eq!(back, 1e-2, max_relative = 1e-12);
    }

    #[test]
    fn integer_round_trip_is_exact() {
        let dim = Dimension::integer("stirring", -3, 7);
        for x in -3..=7 {
            let encoded = encode(&dim, &ParamValue::Integer(x));
            assert_eq!(dim.decode(&encoded), ParamValue::Integer(x));
        }
        let log_dim = Dimension::log_integer("batch", 1, 1000);
        for x in [1, 2, 17, 999, 1000] {
            let encoded = encode(&log_dim, &ParamValue::Integer(x));
            assert_eq!(log_dim.decode(&encoded), ParamValue::Integer(x));
        }
    }

    #[test]
    fn integer_decode_rounds_and_clamps() {
        let dim = Dimension::integer("n", 0, 10);
        assert_eq!(dim.decode(&[0.44]), ParamValue::Integer(4));
        assert_eq!(dim.decode(&[0.46]), ParamValue::Integer(5));
        assert_eq!(dim.decode(&[1.7]), ParamValue::Integer(10));
        assert_eq!(dim.decode(&[-0.2]), ParamValue::Integer(0));
    }

    #[test]
    fn single_valued_integer_dimension() {
        let dim = Dimension::integer("fixed", 4, 4);
        dim.validate().unwrap();
        assert_eq!(encode(&dim, &ParamValue::Integer(4)), vec![0.0]);
        assert_eq!(dim.decode(&[0.9]), ParamValue::Integer(4));
    }

    #[test]
    fn one_hot_categorical() {
        let dim = Dimension::categorical("solvent", ["water", "ethanol", "acetone"]);
        assert_eq!(dim.encoded_len(), 3);
        assert_eq!(encode(&dim, &"ethanol".into()), vec![0.0, 1.0, 0.0]);
        assert_eq!(dim.decode(&[0.2, 0.1, 0.7]), ParamValue::from("acetone"));
        // Ties go to the first category.
        assert_eq!(dim.decode(&[0.5, 0.5, 0.1]), ParamValue::from("water"));
    }

    #[test]
    fn ordinal_categorical_maps_to_nearest() {
        let dim = Dimension::ordinal_categorical("grade", ["low", "mid", "high"]);
        assert_eq!(dim.encoded_len(), 1);
        assert_eq!(encode(&dim, &"mid".into()), vec![0.5]);
        assert_eq!(dim.decode(&[0.7]), ParamValue::from("mid"));
        assert_eq!(dim.decode(&[0.8]), ParamValue::from("high"));
        assert_eq!(dim.decode(&[0.1]), ParamValue::from("low"));
    }

    #[test]
    fn rejects_invalid_values() {
        let dim = Dimension::real("x", 0.0, 1.0);
        assert!(matches!(
            dim.check(&ParamValue::Real(1.5)),
            Err(InvalidPointError::OutOfBounds { .. })
        ));
        assert!(matches!(
            dim.check(&ParamValue::Real(f64::NAN)),
            Err(InvalidPointError::NonFinite { .. })
        ));
        assert!(matches!(
            dim.check(&ParamValue::Integer(0)),
            Err(InvalidPointError::WrongKind { .. })
        ));

        let cat = Dimension::categorical("c", ["a", "b"]);
        assert!(matches!(
            cat.check(&"z".into()),
            Err(InvalidPointError::UnknownCategory { .. })
        ));
    }

    #[test]
    fn validation_catches_bad_domains() {
        assert!(Dimension::real("x", 1.0, 1.0).validate().is_err());
        assert!(Dimension::real("x", 0.0, f64::INFINITY).validate().is_err());
        assert!(Dimension::log_real("x", 0.0, 1.0).validate().is_err());
        assert!(Dimension::integer("n", 5, 4).validate().is_err());
        assert!(Dimension::log_integer("n", 0, 4).validate().is_err());
        assert!(Dimension::categorical::<&str>("c", []).validate().is_err());
        assert!(Dimension::categorical("c", ["a", "a"]).validate().is_err());
        assert!(Dimension::real(" ", 0.0, 1.0).validate().is_err());
    }

    #[test]
    fn samples_stay_in_bounds() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let dims = [
            Dimension::real("a", -2.0, 2.0),
            Dimension::log_real("b", 1e-5, 1e-1),
            Dimension::integer("c", 5, 15),
            Dimension::log_integer("d", 1, 512),
            Dimension::categorical("e", ["x", "y"]),
        ];
        for _ in 0..200 {
            for dim in &dims {
                let value = dim.sample(&mut rng);
                dim.check(&value).unwrap();
            }
        }
    }
}
