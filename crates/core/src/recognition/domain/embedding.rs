use serde::{Deserialize, Serialize};

use super::face_embedder::EmbeddingError;

const UNIT_TOLERANCE: f64 = 1e-6;

/// A unit-length face feature vector.
///
/// The only way to build one is through [`Embedding::from_raw`], which
/// normalizes, so every comparison operates on normalized vectors.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f32>", into = "Vec<f32>")]
pub struct Embedding(Vec<f32>);

impl Embedding {
    /// L2-normalizes `values`. Zero or non-finite vectors have no direction
    /// and are rejected.
    pub fn from_raw(mut values: Vec<f32>) -> Result<Self, EmbeddingError> {
        let norm = values
            .iter()
            .map(|x| (*x as f64) * (*x as f64))
            .sum::<f64>()
            .sqrt();
        if norm == 0.0 || !norm.is_finite() {
            return Err(EmbeddingError::ZeroVector);
        }
        // Already-unit input (e.g. reloaded from disk) is kept bit-for-bit.
        if (norm - 1.0).abs() > UNIT_TOLERANCE {
            for x in values.iter_mut() {
                *x = (*x as f64 / norm) as f32;
            }
        }
        Ok(Self(values))
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn dimension(&self) -> usize {
        self.0.len()
    }

    /// Cosine similarity in `[-1, 1]`: the dot product of two unit vectors.
    /// Vectors from different models (mismatched lengths) never match and
    /// score the minimum.
    pub fn similarity(&self, other: &Embedding) -> f64 {
        if self.0.len() != other.0.len() {
            return -1.0;
        }
        let dot: f64 = self
            .0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (*a as f64) * (*b as f64))
            .sum();
        dot.clamp(-1.0, 1.0)
    }
}

impl TryFrom<Vec<f32>> for Embedding {
    type Error = EmbeddingError;

    fn try_from(values: Vec<f32>) -> Result<Self, Self::Error> {
        Self::from_raw(values)
    }
}

impl From<Embedding> for Vec<f32> {
    fn from(embedding: Embedding) -> Self {
        embedding.0
    }
}
