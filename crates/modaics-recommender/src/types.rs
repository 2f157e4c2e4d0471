//! Core value types: feature vectors, catalog entries, ranked results.

use serde::{Deserialize, Serialize};

use crate::error::{RecommendError, RecommendResult};

/// Dense image embedding produced by an encoder.
///
/// Length is fixed per deployment (2048 for the ResNet-50 backbone).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector(Vec<f32>);

impl FeatureVector {
    /// Wrap raw values without validation.
    #[must_use]
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    /// Wrap raw values, rejecting NaN and infinities.
    ///
    /// # Errors
    /// `RecommendError::InvalidValue` naming the first non-finite component.
    pub fn try_new(values: Vec<f32>) -> RecommendResult<Self> {
        let vector = Self(values);
        vector.validate_finite()?;
        Ok(vector)
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> Vec<f32> {
        self.0
    }

    /// Euclidean norm, accumulated in f64.
    #[must_use]
    pub fn l2_norm(&self) -> f64 {
        l2_norm(&self.0)
    }

    /// Check that every component is finite.
    ///
    /// # Errors
    /// `RecommendError::InvalidValue` for the first NaN/Inf component.
    pub fn validate_finite(&self) -> RecommendResult<()> {
        validate_finite(&self.0)
    }
}

impl From<Vec<f32>> for FeatureVector {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}

impl AsRef<[f32]> for FeatureVector {
    fn as_ref(&self) -> &[f32] {
        &self.0
    }
}

pub(crate) fn l2_norm(values: &[f32]) -> f64 {
    values
        .iter()
        .map(|&v| f64::from(v) * f64::from(v))
        .sum::<f64>()
        .sqrt()
}

pub(crate) fn validate_finite(values: &[f32]) -> RecommendResult<()> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(index) => Err(RecommendError::InvalidValue {
            index,
            value: values[index],
        }),
        None => Ok(()),
    }
}

/// One catalog item: identifier plus its precomputed vector.
///
/// The L2 norm is cached at construction so ranking only computes the
/// query norm once per request.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    id: String,
    vector: FeatureVector,
    norm: f64,
}

impl CatalogEntry {
    #[must_use]
    pub fn new(id: impl Into<String>, vector: FeatureVector) -> Self {
        let norm = vector.l2_norm();
        Self {
            id: id.into(),
            vector,
            norm,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn vector(&self) -> &FeatureVector {
        &self.vector
    }

    #[must_use]
    pub fn norm(&self) -> f64 {
        self.norm
    }
}

/// A scored catalog match, ordered by rank in query results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    /// Cosine similarity, conceptually in [-1.0, 1.0].
    pub score: f32,

    /// Catalog identifier (image filename in the bundled dataset).
    pub id: String,
}

impl RankedResult {
    #[must_use]
    pub fn new(score: f32, id: impl Into<String>) -> Self {
        Self {
            score,
            id: id.into(),
        }
    }
}
