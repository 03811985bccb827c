//! Page decoding and the OCR image normalizer
//!
//! Every page goes through the same deterministic transform before it reaches a
//! recognition engine:
//!
//! ```text
//! any color mode → RGB → 2× Lanczos upscale → grayscale (BT.601)
//!     → 3×3 Gaussian blur → adaptive Gaussian threshold (37, C=1)
//! ```
//!
//! Multi-frame TIFFs are split into one [`Page`] per frame.

use crate::config::NormalizerConfig;
use crate::error::ExtractionError;
use crate::types::Page;
use anyhow::{anyhow, bail, Result};
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, ImageBuffer, Luma, RgbImage};
use imageproc::filter::separable_filter_equal;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;
use tiff::ColorType;

pub struct ImageNormalizer {
    config: NormalizerConfig,
}

impl Default for ImageNormalizer {
    fn default() -> Self {
        Self::new(NormalizerConfig::default())
    }
}

impl ImageNormalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    /// Produce the single-channel binary image handed to recognition
    pub fn normalize(&self, image: &DynamicImage) -> Result<GrayImage> {
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();
        if width == 0 || height == 0 {
            bail!("invalid page dimensions {}x{}", width, height);
        }

        let scale = self.config.scale_factor.max(1);
        let upscaled = image::imageops::resize(
            &rgb,
            width * scale,
            height * scale,
            FilterType::Lanczos3,
        );

        let gray = to_grayscale(&upscaled);
        let blurred = separable_filter_equal(&gray, &gaussian_kernel(self.config.blur_kernel));
        Ok(adaptive_gaussian_threshold(
            &blurred,
            self.config.threshold_block_size,
            self.config.threshold_offset,
        ))
    }
}

/// Luma with ITU-R BT.601 weights, rounded
fn to_grayscale(rgb: &RgbImage) -> GrayImage {
    let (width, height) = rgb.dimensions();
    GrayImage::from_fn(width, height, |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        let luma = (299 * r as u32 + 587 * g as u32 + 114 * b as u32 + 500) / 1000;
        Luma([luma as u8])
    })
}

/// 1-D Gaussian kernel. Widths up to 7 use the fixed binomial tables, wider
/// kernels derive sigma from the width.
pub fn gaussian_kernel(size: u32) -> Vec<f32> {
    match size {
        0 | 1 => vec![1.0],
        3 => vec![0.25, 0.5, 0.25],
        5 => vec![0.0625, 0.25, 0.375, 0.25, 0.0625],
        7 => vec![0.03125, 0.109375, 0.21875, 0.28125, 0.21875, 0.109375, 0.03125],
        _ => {
            let sigma = 0.3 * ((size as f32 - 1.0) * 0.5 - 1.0) + 0.8;
            let half = (size / 2) as i32;
            let mut kernel: Vec<f32> = (-half..=half)
                .map(|i| (-((i * i) as f32) / (2.0 * sigma * sigma)).exp())
                .collect();
            let sum: f32 = kernel.iter().sum();
            kernel.iter_mut().for_each(|v| *v /= sum);
            kernel
        }
    }
}

/// Pixel is white when it is brighter than its Gaussian-weighted neighbourhood mean minus `offset`
fn adaptive_gaussian_threshold(gray: &GrayImage, block_size: u32, offset: f32) -> GrayImage {
    let local_mean = separable_filter_equal(gray, &gaussian_kernel(block_size));
    let (width, height) = gray.dimensions();
    GrayImage::from_fn(width, height, |x, y| {
        let src = gray.get_pixel(x, y).0[0] as f32;
        let mean = local_mean.get_pixel(x, y).0[0] as f32;
        if src > mean - offset {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}

// ===== PAGE DECODING =====

/// Decompose an image file into pages. TIFFs yield one page per frame.
pub fn load_pages(path: &Path) -> Result<Vec<Page>, ExtractionError> {
    let is_tiff = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_lowercase().as_str(), "tif" | "tiff"))
        .unwrap_or(false);

    if is_tiff {
        match decode_tiff_frames(path) {
            Ok(pages) if !pages.is_empty() => {
                tracing::debug!(path = %path.display(), frames = pages.len(), "decoded tiff frames");
                return Ok(pages);
            }
            Ok(_) => tracing::warn!(path = %path.display(), "tiff has no frames, trying single-frame decode"),
            Err(e) => tracing::warn!(
                path = %path.display(),
                error = %e,
                "multi-frame tiff decode failed, trying single-frame decode"
            ),
        }
    }

    let image = image::open(path).map_err(|e| ExtractionError::decode(path, e))?;
    Ok(vec![Page { index: 0, image }])
}

fn decode_tiff_frames(path: &Path) -> Result<Vec<Page>> {
    let file = File::open(path)?;
    let mut decoder = Decoder::new(BufReader::new(file))?;
    let mut pages = Vec::new();

    loop {
        let (width, height) = decoder.dimensions()?;
        let color = decoder.colortype()?;
        let white_is_zero = decoder
            .get_tag_u32(Tag::PhotometricInterpretation)
            .map(|v| v == 0)
            .unwrap_or(false);
        let data = decoder.read_image()?;
        let image = frame_to_image(width, height, color, data, white_is_zero)?;
        pages.push(Page {
            index: pages.len(),
            image,
        });

        if !decoder.more_images() {
            break;
        }
        decoder.next_image()?;
    }

    Ok(pages)
}

fn frame_to_image(
    width: u32,
    height: u32,
    color: ColorType,
    data: DecodingResult,
    white_is_zero: bool,
) -> Result<DynamicImage> {
    let size_err = || anyhow!("frame buffer does not match {}x{} {:?}", width, height, color);

    let image = match (color, data) {
        (ColorType::Gray(1), DecodingResult::U8(buf)) => {
            DynamicImage::ImageLuma8(unpack_bilevel(width, height, &buf, white_is_zero)?)
        }
        (ColorType::Gray(8), DecodingResult::U8(mut buf)) => {
            if white_is_zero {
                buf.iter_mut().for_each(|v| *v = 255 - *v);
            }
            DynamicImage::ImageLuma8(ImageBuffer::from_raw(width, height, buf).ok_or_else(size_err)?)
        }
        (ColorType::Gray(16), DecodingResult::U16(buf)) => {
            DynamicImage::ImageLuma16(ImageBuffer::from_raw(width, height, buf).ok_or_else(size_err)?)
        }
        (ColorType::GrayA(8), DecodingResult::U8(buf)) => {
            DynamicImage::ImageLumaA8(ImageBuffer::from_raw(width, height, buf).ok_or_else(size_err)?)
        }
        (ColorType::RGB(8), DecodingResult::U8(buf)) => {
            DynamicImage::ImageRgb8(ImageBuffer::from_raw(width, height, buf).ok_or_else(size_err)?)
        }
        (ColorType::RGB(16), DecodingResult::U16(buf)) => {
            DynamicImage::ImageRgb16(ImageBuffer::from_raw(width, height, buf).ok_or_else(size_err)?)
        }
        (ColorType::RGBA(8), DecodingResult::U8(buf)) => {
            DynamicImage::ImageRgba8(ImageBuffer::from_raw(width, height, buf).ok_or_else(size_err)?)
        }
        (ColorType::RGBA(16), DecodingResult::U16(buf)) => {
            DynamicImage::ImageRgba16(ImageBuffer::from_raw(width, height, buf).ok_or_else(size_err)?)
        }
        (other, _) => bail!("unsupported tiff color type {:?}", other),
    };

    Ok(image)
}

/// Expand 1-bit rows (MSB first, byte-aligned) into 8-bit gray
fn unpack_bilevel(width: u32, height: u32, packed: &[u8], white_is_zero: bool) -> Result<GrayImage> {
    let row_bytes = (width as usize).div_ceil(8);
    if packed.len() < row_bytes * height as usize {
        bail!("bilevel frame truncated: {} bytes for {}x{}", packed.len(), width, height);
    }

    Ok(GrayImage::from_fn(width, height, |x, y| {
        let byte = packed[y as usize * row_bytes + x as usize / 8];
        let bit = (byte >> (7 - (x % 8))) & 1;
        let white = (bit == 1) != white_is_zero;
        Luma([if white { 255 } else { 0 }])
    }))
}
