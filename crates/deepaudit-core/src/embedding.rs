//! # Embedding Vectors
//!
//! [`EmbeddingVector`] is a fixed-dimension, unit-normalized biometric
//! descriptor. The only way to build one is through a constructor that
//! normalizes, so every vector that crosses a crate boundary satisfies
//! `‖v‖₂ ≈ 1`.
//!
//! The free functions ([`dot`], [`cosine`], [`normalize`], [`l2_norm`])
//! operate on raw slices because watermarking and attack transforms work
//! on un-normalized intermediates (`v + s·w`) before renormalizing.

use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::error::{DeepAuditError, Result};

/// Norms below this are treated as zero.
pub const NORM_EPSILON: f64 = 1e-12;

/// Euclidean norm of a slice.
pub fn l2_norm(values: &[f64]) -> f64 {
    values.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// Inner product of two equal-length slices.
pub fn dot(a: &[f64], b: &[f64]) -> Result<f64> {
    if a.len() != b.len() {
        return Err(DeepAuditError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }
    Ok(a.iter().zip(b).map(|(x, y)| x * y).sum())
}

/// Cosine similarity, clamped to `[-1, 1]` to absorb rounding drift.
pub fn cosine(a: &[f64], b: &[f64]) -> Result<f64> {
    let raw = dot(a, b)?;
    let na = l2_norm(a);
    let nb = l2_norm(b);
    let denom = na * nb;
    if denom < NORM_EPSILON {
        return Err(DeepAuditError::DegenerateInput { norm: na.min(nb) });
    }
    Ok((raw / denom).clamp(-1.0, 1.0))
}

/// Scale a slice to unit length.
pub fn normalize(values: &[f64]) -> Result<Vec<f64>> {
    if let Some(bad) = values.iter().find(|x| !x.is_finite()) {
        return Err(DeepAuditError::invalid_parameter(
            "embedding",
            format!("contains non-finite component {bad}"),
        ));
    }
    let norm = l2_norm(values);
    if norm < NORM_EPSILON {
        return Err(DeepAuditError::DegenerateInput { norm });
    }
    Ok(values.iter().map(|x| x / norm).collect())
}

/// A unit-normalized embedding of fixed dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct EmbeddingVector(Vec<f64>);

impl EmbeddingVector {
    /// Normalize `values` into an embedding.
    ///
    /// Fails with [`DeepAuditError::DegenerateInput`] on a (near-)zero vector
    /// and [`DeepAuditError::InvalidParameter`] on an empty or non-finite one.
    pub fn new(values: Vec<f64>) -> Result<Self> {
        if values.is_empty() {
            return Err(DeepAuditError::invalid_parameter(
                "embedding",
                "must have at least one dimension",
            ));
        }
        Ok(Self(normalize(&values)?))
    }

    /// Normalize and additionally enforce the expected dimension.
    pub fn with_dim(values: Vec<f64>, expected: usize) -> Result<Self> {
        if values.len() != expected {
            return Err(DeepAuditError::DimensionMismatch {
                expected,
                actual: values.len(),
            });
        }
        Self::new(values)
    }

    /// Draw an isotropic random unit vector (i.i.d. standard normal, normalized).
    pub fn random<R: Rng + ?Sized>(dim: usize, rng: &mut R) -> Result<Self> {
        let values: Vec<f64> = (0..dim).map(|_| rng.sample(StandardNormal)).collect();
        Self::new(values)
    }

    /// Number of components.
    pub fn dim(&self) -> usize {
        self.0.len()
    }

    /// Borrow the components.
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Consume into the component vector.
    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }

    /// Fail with [`DeepAuditError::DimensionMismatch`] unless `dim() == expected`.
    pub fn ensure_dim(&self, expected: usize) -> Result<()> {
        if self.0.len() != expected {
            return Err(DeepAuditError::DimensionMismatch {
                expected,
                actual: self.0.len(),
            });
        }
        Ok(())
    }

    /// Cosine similarity with another embedding.
    ///
    /// Both operands are unit vectors, so this is their dot product.
    pub fn similarity(&self, other: &EmbeddingVector) -> Result<f64> {
        Ok(dot(&self.0, &other.0)?.clamp(-1.0, 1.0))
    }
}

impl TryFrom<Vec<f64>> for EmbeddingVector {
    type Error = DeepAuditError;

    fn try_from(values: Vec<f64>) -> Result<Self> {
        Self::new(values)
    }
}

impl From<EmbeddingVector> for Vec<f64> {
    fn from(value: EmbeddingVector) -> Self {
        value.0
    }
}

impl AsRef<[f64]> for EmbeddingVector {
    fn as_ref(&self) -> &[f64] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn new_normalizes() {
        let v = EmbeddingVector::new(vec![3.0, 4.0]).unwrap();
        assert!((v.as_slice()[0] - 0.6).abs() < 1e-12);
        assert!((v.as_slice()[1] - 0.8).abs() < 1e-12);
    }

    #[test]
    fn zero_vector_is_degenerate() {
        let err = EmbeddingVector::new(vec![0.0; 8]).unwrap_err();
        assert!(matches!(err, DeepAuditError::DegenerateInput { .. }));
    }

    #[test]
    fn empty_and_nan_rejected() {
        assert!(EmbeddingVector::new(vec![]).is_err());
        assert!(EmbeddingVector::new(vec![1.0, f64::NAN]).is_err());
    }

    #[test]
    fn with_dim_enforces_length() {
        let err = EmbeddingVector::with_dim(vec![1.0, 0.0, 0.0], 4).unwrap_err();
        assert!(matches!(
            err,
            DeepAuditError::DimensionMismatch {
                expected: 4,
                actual: 3
            }
        ));
    }

    #[test]
    fn dot_rejects_mismatched_lengths() {
        assert!(dot(&[1.0, 0.0], &[1.0]).is_err());
    }

    #[test]
    fn cosine_of_parallel_vectors_is_one() {
        let c = cosine(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]).unwrap();
        assert!((c - 1.0).abs() < 1e-12);
    }

    #[test]
    fn cosine_of_zero_vector_fails() {
        assert!(cosine(&[0.0, 0.0], &[1.0, 0.0]).is_err());
    }

    #[test]
    fn random_is_unit_and_seeded() {
        let mut a = ChaCha20Rng::seed_from_u64(7);
        let mut b = ChaCha20Rng::seed_from_u64(7);
        let x = EmbeddingVector::random(128, &mut a).unwrap();
        let y = EmbeddingVector::random(128, &mut b).unwrap();
        assert_eq!(x, y);
        assert!((l2_norm(x.as_slice()) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn deserialization_normalizes() {
        let v: EmbeddingVector = serde_yaml::from_str("[0.0, 2.0]").unwrap();
        assert_eq!(v.as_slice(), &[0.0, 1.0]);
    }

    mod proptests {
        use crate::embedding::*;
        use proptest::prelude::*;

        proptest! {
            /// Any non-degenerate finite vector normalizes to unit length.
            #[test]
            fn normalized_vectors_have_unit_norm(
                values in prop::collection::vec(-1.0e3f64..1.0e3, 1..64)
            ) {
                prop_assume!(l2_norm(&values) > 1e-6);
                let v = EmbeddingVector::new(values).unwrap();
                prop_assert!((l2_norm(v.as_slice()) - 1.0).abs() < 1e-9);
            }

            /// Cosine similarity always lands in [-1, 1].
            #[test]
            fn cosine_is_bounded(
                a in prop::collection::vec(-10.0f64..10.0, 16),
                b in prop::collection::vec(-10.0f64..10.0, 16),
            ) {
                prop_assume!(l2_norm(&a) > 1e-6 && l2_norm(&b) > 1e-6);
                let c = cosine(&a, &b).unwrap();
                prop_assert!((-1.0..=1.0).contains(&c));
            }
        }
    }
}
