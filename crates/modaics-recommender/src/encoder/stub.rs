//! Stub image encoder for development without model weights.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::error::{RecommendError, RecommendResult};
use crate::types::{l2_norm, FeatureVector};

use super::constants::RESNET50_DIMENSION;
use super::ImageEncoder;

/// Deterministic stub encoder.
///
/// Hashes the raw image bytes into a unit vector. Same bytes always produce
/// the same vector, so catalog builds and queries are reproducible. The
/// image is not decoded; any non-empty byte string is accepted.
#[derive(Debug, Clone)]
pub struct StubEncoder {
    dimension: usize,
    model_name: String,
}

impl StubEncoder {
    /// Create a stub encoder with the given output dimension.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            model_name: "stub-image-encoder-v1".to_string(),
        }
    }

    /// Unit vector drawn from a splitmix64 stream seeded by the byte hash.
    fn vector_for(&self, bytes: &[u8]) -> Vec<f32> {
        let mut hasher = DefaultHasher::new();
        bytes.hash(&mut hasher);
        let mut state = hasher.finish();

        let raw: Vec<f32> = (0..self.dimension)
            .map(|_| {
                // Top 24 bits mapped onto [-1, 1).
                let bits = splitmix64(&mut state) >> 40;
                (bits as f32 / (1u32 << 23) as f32) - 1.0
            })
            .collect();

        let norm = l2_norm(&raw);
        if norm == 0.0 {
            return raw;
        }
        raw.iter().map(|&v| (f64::from(v) / norm) as f32).collect()
    }
}

fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

impl Default for StubEncoder {
    fn default() -> Self {
        Self::new(RESNET50_DIMENSION)
    }
}

impl ImageEncoder for StubEncoder {
    fn encode(&self, image: &[u8]) -> RecommendResult<FeatureVector> {
        if image.is_empty() {
            return Err(RecommendError::EmptyInput);
        }
        Ok(FeatureVector::new(self.vector_for(image)))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
