//! ResNet-50 feature extractor.
//!
//! The ImageNet-pretrained ResNet-50 with its classification head removed:
//! the global-average-pooled output of the last stage is the 2048D feature
//! vector.
//!
//! Weights are read from a `model.safetensors` file using torchvision/timm
//! tensor names (`conv1.weight`, `bn1.*`, `layer{1..4}.{i}.*`).

use std::fmt;
use std::path::{Path, PathBuf};

use candle_core::{DType, Device, Module, Tensor};
use candle_nn::{Func, VarBuilder};
use candle_transformers::models::resnet;
use tracing::{debug, error, info};

use crate::config::EncoderConfig;
use crate::error::{RecommendError, RecommendResult};
use crate::types::FeatureVector;

use super::constants::{RESNET50_DIMENSION, RESNET50_MODEL_NAME, WEIGHTS_FILE_NAME};
use super::image_processor::ImageProcessor;
use super::ImageEncoder;

/// ResNet-50 image encoder backed by candle.
///
/// The forward pass is reentrant; one instance can serve concurrent
/// requests.
pub struct ResNetEncoder {
    model: Func<'static>,
    device: Device,
    processor: ImageProcessor,
    weights_path: PathBuf,
}

impl ResNetEncoder {
    /// Load weights and preprocessing settings from `config`.
    ///
    /// # Errors
    /// - `ModelLoad` if the weights file is missing or cannot be mapped
    /// - `ModelLoad` if a GPU is requested but cannot be initialised
    pub fn load(config: &EncoderConfig) -> RecommendResult<Self> {
        let device = select_device(config.use_gpu, &config.model_path)?;
        let processor = ImageProcessor::new(config.resize_policy, config.resize_short_side);
        Self::load_from(&config.model_path, device, processor)
    }

    /// Load from an explicit weights path (file, or directory containing
    /// `model.safetensors`).
    pub fn load_from(
        model_path: &Path,
        device: Device,
        processor: ImageProcessor,
    ) -> RecommendResult<Self> {
        let weights_path = if model_path.is_dir() {
            model_path.join(WEIGHTS_FILE_NAME)
        } else {
            model_path.to_path_buf()
        };

        if !weights_path.exists() {
            error!("ResNet weights not found at {}", weights_path.display());
            return Err(RecommendError::ModelLoad {
                path: weights_path.clone(),
                source: Box::new(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("{} not found", weights_path.display()),
                )),
            });
        }

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[&weights_path], DType::F32, &device).map_err(
                |e| {
                    error!("ResNet safetensors load failed: {}", e);
                    RecommendError::ModelLoad {
                        path: weights_path.clone(),
                        source: Box::new(e),
                    }
                },
            )?
        };

        let model =
            resnet::resnet50_no_final_layer(vb).map_err(|e| RecommendError::ModelLoad {
                path: weights_path.clone(),
                source: Box::new(e),
            })?;

        info!(
            "ResNetEncoder loaded from {} on {:?} (resize policy: {})",
            weights_path.display(),
            device,
            processor.policy()
        );

        Ok(Self {
            model,
            device,
            processor,
            weights_path,
        })
    }

    #[must_use]
    pub fn processor(&self) -> &ImageProcessor {
        &self.processor
    }

    #[must_use]
    pub fn weights_path(&self) -> &Path {
        &self.weights_path
    }

    fn forward(&self, pixels: Vec<f32>) -> candle_core::Result<Vec<f32>> {
        let size = self.processor.target_size() as usize;
        let input = Tensor::from_vec(pixels, (1, 3, size, size), &self.device)?;
        self.model
            .forward(&input)?
            .flatten_all()?
            .to_dtype(DType::F32)?
            .to_vec1::<f32>()
    }
}

fn select_device(use_gpu: bool, model_path: &Path) -> RecommendResult<Device> {
    if !use_gpu {
        return Ok(Device::Cpu);
    }
    Device::cuda_if_available(0).map_err(|e| {
        error!("GPU init failed: {}", e);
        RecommendError::ModelLoad {
            path: model_path.to_path_buf(),
            source: Box::new(e),
        }
    })
}

impl ImageEncoder for ResNetEncoder {
    fn encode(&self, image: &[u8]) -> RecommendResult<FeatureVector> {
        let pixels = self.processor.preprocess(image)?;

        let values = self.forward(pixels).map_err(|e| {
            error!("ResNet inference failed: {}", e);
            RecommendError::encoding(format!("inference failed: {}", e))
        })?;

        if values.len() != RESNET50_DIMENSION {
            return Err(RecommendError::encoding(format!(
                "backbone produced {} values, expected {}",
                values.len(),
                RESNET50_DIMENSION
            )));
        }

        let vector = FeatureVector::try_new(values)
            .map_err(|e| RecommendError::encoding(format!("backbone output rejected: {}", e)))?;
        debug!(norm = vector.l2_norm(), "Encoded image");
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        RESNET50_DIMENSION
    }

    fn model_name(&self) -> &str {
        RESNET50_MODEL_NAME
    }
}

impl fmt::Debug for ResNetEncoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResNetEncoder")
            .field("weights_path", &self.weights_path)
            .field("device", &self.device)
            .field("processor", &self.processor)
            .finish_non_exhaustive()
    }
}
