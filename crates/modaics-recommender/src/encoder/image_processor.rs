//! Image preprocessing shared by every encoder.
//!
//! Pipeline:
//! - Decode image bytes (PNG, JPEG, WebP, GIF), format sniffed from content
//! - Resize/crop to 224x224 with bilinear interpolation per [`ResizePolicy`]
//! - Convert to RGB (handles grayscale, RGBA)
//! - Normalize with ImageNet mean/std
//! - Lay out channel-first (CHW)

use image::{DynamicImage, GenericImageView};
use tracing::error;

use crate::error::{RecommendError, RecommendResult};

use super::constants::{ENCODER_IMAGE_SIZE, IMAGENET_MEAN, IMAGENET_STD};
use super::ResizePolicy;

/// Deterministic preprocessing for ResNet-style encoders.
///
/// The same processor settings must be used when building the catalog and
/// when encoding queries, otherwise scores are not comparable.
///
/// # Example
///
/// ```rust,no_run
/// use modaics_recommender::encoder::{ImageProcessor, ResizePolicy};
///
/// fn example() -> modaics_recommender::RecommendResult<()> {
///     let processor = ImageProcessor::new(ResizePolicy::CenterCrop, 256);
///     let bytes = std::fs::read("jacket.jpg")?;
///     let tensor = processor.preprocess(&bytes)?;
///     assert_eq!(tensor.len(), 3 * 224 * 224);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ImageProcessor {
    /// Square output size (224).
    target_size: u32,
    policy: ResizePolicy,
    /// Shorter-side length before cropping, `CenterCrop` only.
    short_side: u32,
    mean: [f32; 3],
    std: [f32; 3],
}

impl Default for ImageProcessor {
    fn default() -> Self {
        Self::new(ResizePolicy::CenterCrop, 256)
    }
}

impl ImageProcessor {
    /// Create a processor with ImageNet normalization.
    ///
    /// `short_side` is clamped up to the target size.
    #[must_use]
    pub fn new(policy: ResizePolicy, short_side: u32) -> Self {
        Self {
            target_size: ENCODER_IMAGE_SIZE,
            policy,
            short_side: short_side.max(ENCODER_IMAGE_SIZE),
            mean: IMAGENET_MEAN,
            std: IMAGENET_STD,
        }
    }

    /// Preprocess image bytes into a normalized CHW tensor.
    ///
    /// # Returns
    /// Flattened `[3, 224, 224]` tensor as `Vec<f32>` (150528 values).
    ///
    /// # Errors
    /// - `EmptyInput` if bytes is empty
    /// - `Encoding` if the bytes cannot be decoded or have zero dimensions
    pub fn preprocess(&self, bytes: &[u8]) -> RecommendResult<Vec<f32>> {
        if bytes.is_empty() {
            return Err(RecommendError::EmptyInput);
        }

        let img = self.decode_image(bytes)?;
        let (width, height) = img.dimensions();
        if width == 0 || height == 0 {
            return Err(RecommendError::encoding("image has zero dimensions"));
        }

        let rgb = self.resize(&img)?.to_rgb8();

        let plane = (self.target_size * self.target_size) as usize;
        let mut tensor = vec![0.0f32; plane * 3];
        for (i, pixel) in rgb.pixels().enumerate() {
            for channel in 0..3 {
                // (value/255 - mean) / std
                tensor[channel * plane + i] = (f32::from(pixel[channel]) / 255.0
                    - self.mean[channel])
                    / self.std[channel];
            }
        }

        Ok(tensor)
    }

    fn resize(&self, img: &DynamicImage) -> RecommendResult<DynamicImage> {
        let filter = image::imageops::FilterType::Triangle; // Bilinear
        let size = self.target_size;

        match self.policy {
            ResizePolicy::Stretch => Ok(img.resize_exact(size, size, filter)),
            ResizePolicy::CenterCrop => {
                let (width, height) = img.dimensions();
                let (w, h) = scale_short_side(width, height, self.short_side).ok_or_else(|| {
                    error!("Image {}x{} too elongated to resize", width, height);
                    RecommendError::encoding(format!(
                        "image {}x{} exceeds the {} pixel resize limit",
                        width, height, MAX_RESIZED_SIDE
                    ))
                })?;
                let resized = img.resize_exact(w, h, filter);
                Ok(resized.crop_imm(crop_offset(w - size), crop_offset(h - size), size, size))
            }
        }
    }

    fn decode_image(&self, bytes: &[u8]) -> RecommendResult<DynamicImage> {
        let format = image::guess_format(bytes).map_err(|e| {
            error!("Unrecognised image format: {}", e);
            RecommendError::encoding(format!("unrecognised image format: {}", e))
        })?;

        image::load_from_memory_with_format(bytes, format).map_err(|e| {
            error!("Failed to decode image: {}", e);
            RecommendError::encoding(format!("failed to decode {:?} image: {}", format, e))
        })
    }

    #[must_use]
    pub const fn target_size(&self) -> u32 {
        self.target_size
    }

    #[must_use]
    pub const fn policy(&self) -> ResizePolicy {
        self.policy
    }
}

/// Longest side allowed after the short-side resize.
const MAX_RESIZED_SIDE: u32 = 8192;

/// Dimensions after scaling so the shorter side equals `short`.
///
/// The longer side is truncated, matching torchvision's `Resize(int)`.
/// `None` when the longer side would exceed [`MAX_RESIZED_SIDE`].
fn scale_short_side(width: u32, height: u32, short: u32) -> Option<(u32, u32)> {
    let (min, max) = (width.min(height), width.max(height));
    let long = u64::from(short) * u64::from(max) / u64::from(min);
    if long > u64::from(MAX_RESIZED_SIDE) {
        return None;
    }
    let long = (long as u32).max(short);
    Some(if width <= height {
        (short, long)
    } else {
        (long, short)
    })
}

/// Leading offset of a centre crop with `margin` spare pixels.
///
/// `margin / 2` rounded half to even, as torchvision's `CenterCrop` does.
fn crop_offset(margin: u32) -> u32 {
    let half = margin / 2;
    if margin % 2 == 1 && half % 2 == 1 {
        half + 1
    } else {
        half
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    const PLANE: usize = 224 * 224;

    pub(crate) fn png_bytes(img: RgbImage) -> Vec<u8> {
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    fn normalized(value: u8, channel: usize) -> f32 {
        (f32::from(value) / 255.0 - IMAGENET_MEAN[channel]) / IMAGENET_STD[channel]
    }

    #[test]
    fn test_output_shape() {
        let bytes = png_bytes(RgbImage::from_pixel(640, 480, Rgb([10, 20, 30])));
        let tensor = ImageProcessor::default().preprocess(&bytes).unwrap();
        assert_eq!(tensor.len(), 3 * PLANE);
    }

    #[test]
    fn test_empty_input() {
        let err = ImageProcessor::default().preprocess(&[]).unwrap_err();
        assert!(matches!(err, RecommendError::EmptyInput));
    }

    #[test]
    fn test_garbage_bytes_is_encoding_error() {
        let err = ImageProcessor::default()
            .preprocess(b"definitely not an image")
            .unwrap_err();
        assert!(matches!(err, RecommendError::Encoding { .. }));
    }

    #[test]
    fn test_truncated_png_is_encoding_error() {
        let bytes = png_bytes(RgbImage::from_pixel(32, 32, Rgb([200, 0, 0])));
        let err = ImageProcessor::default()
            .preprocess(&bytes[..bytes.len() / 2])
            .unwrap_err();
        assert!(matches!(err, RecommendError::Encoding { .. }));
    }

    #[test]
    fn test_channel_first_layout() {
        let bytes = png_bytes(RgbImage::from_pixel(300, 300, Rgb([255, 128, 0])));
        let tensor = ImageProcessor::default().preprocess(&bytes).unwrap();

        for (channel, value) in [255u8, 128, 0].into_iter().enumerate() {
            let expected = normalized(value, channel);
            let plane = &tensor[channel * PLANE..(channel + 1) * PLANE];
            assert!(
                plane.iter().all(|v| (v - expected).abs() < 1e-4),
                "channel {} not uniform at {}",
                channel,
                expected
            );
        }
    }

    #[test]
    fn test_center_crop_discards_edges() {
        // 600x300 with a black band on the left 100 columns.
        let img = RgbImage::from_fn(600, 300, |x, _| {
            if x < 100 {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        });
        let bytes = png_bytes(img);
        let white = normalized(255, 0);

        let cropped = ImageProcessor::new(ResizePolicy::CenterCrop, 256)
            .preprocess(&bytes)
            .unwrap();
        assert!(cropped[..PLANE].iter().all(|v| (v - white).abs() < 1e-3));

        let stretched = ImageProcessor::new(ResizePolicy::Stretch, 256)
            .preprocess(&bytes)
            .unwrap();
        assert!((stretched[0] - normalized(0, 0)).abs() < 1e-3);
    }

    #[test]
    fn test_center_crop_odd_margin_rounds_half_to_even() {
        // 289x256: no resize, horizontal margin 65, crop starts at column 32.
        let img = RgbImage::from_fn(289, 256, |x, _| {
            if x == 32 {
                Rgb([255, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        });
        let tensor = ImageProcessor::new(ResizePolicy::CenterCrop, 256)
            .preprocess(&png_bytes(img))
            .unwrap();

        let green = &tensor[PLANE..2 * PLANE];
        let red_line = normalized(0, 1);
        let white = normalized(255, 1);
        for row in 0..224 {
            assert!(
                (green[row * 224] - red_line).abs() < 1e-4,
                "row {}: crop did not start at the red column",
                row
            );
            assert!((green[row * 224 + 1] - white).abs() < 1e-4);
        }
    }

    #[test]
    fn test_crop_offset() {
        assert_eq!(crop_offset(0), 0);
        assert_eq!(crop_offset(32), 16);
        assert_eq!(crop_offset(65), 32);
        assert_eq!(crop_offset(67), 34);
        assert_eq!(crop_offset(1), 0);
        assert_eq!(crop_offset(3), 2);
    }

    #[test]
    fn test_extreme_aspect_ratio_is_encoding_error() {
        let bytes = png_bytes(RgbImage::from_pixel(1, 20_000, Rgb([9, 9, 9])));
        let err = ImageProcessor::new(ResizePolicy::CenterCrop, 256)
            .preprocess(&bytes)
            .unwrap_err();
        assert!(matches!(err, RecommendError::Encoding { .. }));

        let stretched = ImageProcessor::new(ResizePolicy::Stretch, 256).preprocess(&bytes);
        assert!(stretched.is_ok());
    }

    #[test]
    fn test_deterministic() {
        let img = RgbImage::from_fn(97, 131, |x, y| Rgb([(x * 2) as u8, (y * 3) as u8, 77]));
        let bytes = png_bytes(img);
        let processor = ImageProcessor::default();
        assert_eq!(
            processor.preprocess(&bytes).unwrap(),
            processor.preprocess(&bytes).unwrap()
        );
    }

    #[test]
    fn test_scale_short_side() {
        assert_eq!(scale_short_side(600, 300, 256), Some((512, 256)));
        assert_eq!(scale_short_side(300, 600, 256), Some((256, 512)));
        assert_eq!(scale_short_side(500, 500, 256), Some((256, 256)));
        assert_eq!(scale_short_side(1000, 999, 256), Some((256, 256)));
        assert_eq!(scale_short_side(32, 1024, 256), Some((256, 8192)));
        assert_eq!(scale_short_side(1, 100_000, 256), None);
    }
}
