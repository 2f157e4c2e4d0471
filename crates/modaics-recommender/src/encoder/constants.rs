//! Constants for the ResNet-50 image encoder.

/// Output dimension of ResNet-50 with the final FC layer removed.
pub const RESNET50_DIMENSION: usize = 2048;

/// Identifier reported by [`super::ResNetEncoder::model_name`].
pub const RESNET50_MODEL_NAME: &str = "resnet50-feature-extractor";

/// Square input resolution (224x224 pixels).
pub const ENCODER_IMAGE_SIZE: u32 = 224;

/// ImageNet RGB normalization mean values.
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// ImageNet RGB normalization standard deviation values.
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Weights file looked up when `model_path` names a directory.
pub(crate) const WEIGHTS_FILE_NAME: &str = "model.safetensors";
