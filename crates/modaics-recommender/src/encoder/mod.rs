//! Image encoders: raw image bytes in, fixed-length feature vector out.
//!
//! # Architecture
//!
//! ```text
//! ImageEncoder (trait)
//! ├── encode(&[u8]) -> FeatureVector       // Single image
//! ├── encode_batch(&[&[u8]]) -> Vec<..>     // Catalog construction
//! ├── dimension() -> usize                  // Output length D
//! └── model_name() -> &str
//!
//! ResNetEncoder   ResNet-50 backbone, classifier removed (2048D)
//! StubEncoder     Deterministic hash-based vectors, no weights needed
//! ```
//!
//! Every encoder runs the same [`ImageProcessor`] pipeline before inference
//! so catalog vectors and query vectors are comparable.

mod constants;
mod image_processor;
mod resnet;
mod stub;

use serde::{Deserialize, Serialize};

use crate::error::RecommendResult;
use crate::types::FeatureVector;

pub use constants::{
    ENCODER_IMAGE_SIZE, IMAGENET_MEAN, IMAGENET_STD, RESNET50_DIMENSION, RESNET50_MODEL_NAME,
};
pub use image_processor::ImageProcessor;
pub use resnet::ResNetEncoder;
pub use stub::StubEncoder;

/// Converts an encoded image into a feature vector.
///
/// Implementations must be deterministic for fixed weights and safe to call
/// from many threads at once.
pub trait ImageEncoder: Send + Sync {
    /// Encode a single image (PNG, JPEG, WebP or GIF bytes).
    ///
    /// # Errors
    /// - `EmptyInput` for zero-length input
    /// - `Encoding` if decoding, resizing or inference fails
    fn encode(&self, image: &[u8]) -> RecommendResult<FeatureVector>;

    /// Encode several images, failing on the first error.
    fn encode_batch(&self, images: &[&[u8]]) -> RecommendResult<Vec<FeatureVector>> {
        images.iter().map(|image| self.encode(image)).collect()
    }

    /// Length of every vector this encoder returns.
    fn dimension(&self) -> usize;

    fn model_name(&self) -> &str;
}

/// Rule for bringing an image to the encoder's square input resolution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizePolicy {
    /// Resize the shorter side to the configured length, then crop the
    /// centre square. Matches the pipeline used to build the catalog.
    #[default]
    CenterCrop,
    /// Resize straight to the square resolution, ignoring aspect ratio.
    Stretch,
}

impl ResizePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResizePolicy::CenterCrop => "center_crop",
            ResizePolicy::Stretch => "stretch",
        }
    }
}

impl std::fmt::Display for ResizePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
